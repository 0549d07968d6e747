// In-memory implementations for examples and testing
//
// Keeps records in memory so the read path can run without a database.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::record::{EventType, RawRecord};
use crate::traits::RecordGetter;

/// In-memory record store
///
/// Records are kept per device in insertion order, which is the order they are
/// returned in.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<String, Vec<RawRecord>>>>,
    failure: Arc<RwLock<Option<String>>>,
}

impl InMemoryRecordStore {
    /// Create a new in-memory record store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record for its device
    pub async fn insert(&self, record: RawRecord) {
        self.records
            .write()
            .await
            .entry(record.device_id.clone())
            .or_default()
            .push(record);
    }

    /// Pre-populate a device's records, replacing any existing ones
    pub async fn seed(&self, device_id: &str, records: Vec<RawRecord>) {
        self.records
            .write()
            .await
            .insert(device_id.to_string(), records);
    }

    /// Make every query fail with `message` until cleared
    pub async fn fail_with(&self, message: impl Into<String>) {
        *self.failure.write().await = Some(message.into());
    }

    pub async fn clear_failure(&self) {
        *self.failure.write().await = None;
    }

    /// Clear all records
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    async fn query(
        &self,
        device_id: &str,
        limit: usize,
        event_type: Option<EventType>,
    ) -> anyhow::Result<Vec<RawRecord>> {
        if let Some(message) = self.failure.read().await.as_ref() {
            anyhow::bail!("{}", message);
        }

        Ok(self
            .records
            .read()
            .await
            .get(device_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| event_type.map_or(true, |t| record.event_type == t))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl RecordGetter for InMemoryRecordStore {
    async fn get_records(&self, device_id: &str, limit: usize) -> anyhow::Result<Vec<RawRecord>> {
        self.query(device_id, limit, None).await
    }

    async fn get_records_of_type(
        &self,
        device_id: &str,
        limit: usize,
        event_type: EventType,
    ) -> anyhow::Result<Vec<RawRecord>> {
        self.query(device_id, limit, Some(event_type)).await
    }
}
