// Event aggregation
//
// EventReader drives the read path for one device:
// store query -> expiry filter -> per-record resolution -> events list or status.

use chrono::Utc;
use std::sync::Arc;

use crate::cipher::Ciphers;
use crate::decoder::MessageDecoder;
use crate::error::{ReadError, Result};
use crate::event::ResolvedEvent;
use crate::expiry::filter_expired;
use crate::measures::{Failure, Measures};
use crate::record::EventType;
use crate::resolver::RecordResolver;
use crate::status::{derive_status, DeviceStatus};
use crate::traits::RecordGetter;

/// Default number of records requested from the store per query
pub const DEFAULT_GET_LIMIT: usize = 50;

/// Reads a device's events and derives its status.
///
/// Holds only read-only handles plus the shared failure counters, so one
/// reader serves every request.
#[derive(Clone)]
pub struct EventReader {
    records: Arc<dyn RecordGetter>,
    resolver: RecordResolver,
    get_limit: usize,
}

impl EventReader {
    pub fn new(
        records: Arc<dyn RecordGetter>,
        ciphers: Arc<Ciphers>,
        decoder: Arc<dyn MessageDecoder>,
        measures: Arc<Measures>,
    ) -> Self {
        Self {
            records,
            resolver: RecordResolver::new(ciphers, decoder, measures),
            get_limit: DEFAULT_GET_LIMIT,
        }
    }

    /// Set the record limit passed to the store
    pub fn with_get_limit(mut self, get_limit: usize) -> Self {
        self.get_limit = get_limit;
        self
    }

    pub fn get_limit(&self) -> usize {
        self.get_limit
    }

    pub fn measures(&self) -> &Arc<Measures> {
        self.resolver.measures()
    }

    /// All live events of a device, in store order.
    ///
    /// Records that fail to decrypt or decode are returned as Unknown-type
    /// placeholders. Fails with NotFound only when no live record exists.
    pub async fn get_device_events(&self, device_id: &str) -> Result<Vec<ResolvedEvent>> {
        let records = self
            .records
            .get_records(device_id, self.get_limit)
            .await
            .map_err(|e| ReadError::upstream(device_id, e))?;

        let events: Vec<ResolvedEvent> = filter_expired(records, Utc::now())
            .iter()
            .map(|record| self.resolver.resolve(record))
            .collect();

        if events.is_empty() {
            return Err(ReadError::not_found(device_id));
        }

        tracing::debug!(device_id = %device_id, count = events.len(), "Resolved device events");
        Ok(events)
    }

    /// Current online/offline status of a device.
    ///
    /// Only fully decoded state events count; placeholders and events without
    /// a derivable state are left out. Fails with NotFound when none remain.
    pub async fn get_device_status(&self, device_id: &str) -> Result<DeviceStatus> {
        let records = self
            .records
            .get_records_of_type(device_id, self.get_limit, EventType::State)
            .await
            .map_err(|e| ReadError::upstream(device_id, e))?;

        let state_events: Vec<ResolvedEvent> = filter_expired(records, Utc::now())
            .iter()
            .map(|record| self.resolver.resolve(record))
            .filter(|event| !event.is_placeholder())
            .filter(|event| {
                if event.state.is_some() {
                    return true;
                }
                self.measures().record(Failure::UnknownState);
                tracing::debug!(
                    device_id = %device_id,
                    dest = %event.message.dest,
                    "Skipping state event without online/offline state"
                );
                false
            })
            .collect();

        let snapshot =
            derive_status(&state_events).ok_or_else(|| ReadError::not_found(device_id))?;

        Ok(DeviceStatus::new(device_id, snapshot, Utc::now()))
    }
}
