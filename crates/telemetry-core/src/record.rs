// Stored event records
//
// A RawRecord is what the record store hands back: an encrypted device message
// plus retention metadata. Records are immutable and request-scoped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of event a record was stored as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Any device event
    #[default]
    Default,
    /// Online/offline transitions, used to derive device status
    State,
}

impl EventType {
    /// Integer code used by the store
    pub fn code(self) -> i32 {
        match self {
            EventType::Default => 0,
            EventType::State => 1,
        }
    }
}

impl From<i32> for EventType {
    fn from(code: i32) -> Self {
        match code {
            1 => EventType::State,
            _ => EventType::Default,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Default => write!(f, "default"),
            EventType::State => write!(f, "state"),
        }
    }
}

/// Record as returned by the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub id: i64,
    pub device_id: String,
    pub event_type: EventType,
    /// When the store received the message
    pub birth_date: DateTime<Utc>,
    /// Retention deadline; the record is dead at or after this instant
    pub death_date: DateTime<Utc>,
    /// Encrypted message bytes
    pub data: Vec<u8>,
    pub nonce: Vec<u8>,
    /// Name of the algorithm the data was encrypted with
    pub alg: String,
    /// Identifier of the key the data was encrypted with
    pub key_id: String,
}

impl RawRecord {
    /// A record is live while its death date is strictly after `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.death_date > now
    }
}

/// Convert Unix seconds to a UTC timestamp.
///
/// Out-of-range values collapse to the epoch, which the expiry filter treats
/// as already dead.
pub fn timestamp_from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}
