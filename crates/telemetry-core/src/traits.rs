// Core traits for pluggable backends
//
// The record store is the one asynchronous collaborator of the read path:
// - Database implementation (Postgres) for production
// - In-memory implementation for examples and testing

use async_trait::async_trait;

use crate::record::{EventType, RawRecord};

/// Fetches stored records for a device.
///
/// Implementations return records in their natural store order; the read path
/// preserves that order.
#[async_trait]
pub trait RecordGetter: Send + Sync {
    /// Records of every event type, at most `limit`
    async fn get_records(&self, device_id: &str, limit: usize) -> anyhow::Result<Vec<RawRecord>>;

    /// Records of one event type, at most `limit`
    async fn get_records_of_type(
        &self,
        device_id: &str,
        limit: usize,
        event_type: EventType,
    ) -> anyhow::Result<Vec<RawRecord>>;
}
