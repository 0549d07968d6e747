// Database models (internal, may differ from core types)

use sqlx::FromRow;
use telemetry_core::{timestamp_from_unix, EventType, RawRecord};

#[derive(Debug, Clone, FromRow)]
pub struct RecordRow {
    pub id: i64,
    pub device_id: String,
    pub event_type: i32,
    pub birth_date: i64,
    pub death_date: i64,
    pub data: Vec<u8>,
    pub nonce: Vec<u8>,
    pub alg: String,
    pub kid: String,
}

impl From<RecordRow> for RawRecord {
    fn from(row: RecordRow) -> Self {
        RawRecord {
            id: row.id,
            device_id: row.device_id,
            event_type: EventType::from(row.event_type),
            birth_date: timestamp_from_unix(row.birth_date),
            death_date: timestamp_from_unix(row.death_date),
            data: row.data,
            nonce: row.nonce,
            alg: row.alg,
            key_id: row.kid,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateRecord {
    pub device_id: String,
    pub event_type: EventType,
    pub birth_date: i64,
    pub death_date: i64,
    pub data: Vec<u8>,
    pub nonce: Vec<u8>,
    pub alg: String,
    pub kid: String,
}
