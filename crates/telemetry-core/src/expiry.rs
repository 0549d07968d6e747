// Retention filter

use chrono::{DateTime, Utc};

use crate::record::RawRecord;

/// Keep the records whose death date is strictly after `now`, in order.
///
/// Expiry is routine, so dropped records are only traced.
pub fn filter_expired(records: Vec<RawRecord>, now: DateTime<Utc>) -> Vec<RawRecord> {
    records
        .into_iter()
        .filter(|record| {
            let live = record.is_live(now);
            if !live {
                tracing::trace!(
                    device_id = %record.device_id,
                    record_id = record.id,
                    death_date = %record.death_date,
                    "Skipping expired record"
                );
            }
            live
        })
        .collect()
}
