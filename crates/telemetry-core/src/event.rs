// Device messages and resolved events
//
// DeviceMessage is the structured form of a decrypted record. ResolvedEvent is
// what the read path hands back per record: the decoded message stamped with
// the record's birth date, or an Unknown-type placeholder when the record
// could not be decrypted or decoded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Message type codes of the device routing protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum MessageType {
    Authorization,
    SimpleRequestResponse,
    SimpleEvent,
    Create,
    Retrieve,
    Update,
    Delete,
    ServiceRegistration,
    ServiceAlive,
    #[default]
    Unknown,
}

impl From<i64> for MessageType {
    fn from(code: i64) -> Self {
        match code {
            2 => MessageType::Authorization,
            3 => MessageType::SimpleRequestResponse,
            4 => MessageType::SimpleEvent,
            5 => MessageType::Create,
            6 => MessageType::Retrieve,
            7 => MessageType::Update,
            8 => MessageType::Delete,
            9 => MessageType::ServiceRegistration,
            10 => MessageType::ServiceAlive,
            _ => MessageType::Unknown,
        }
    }
}

impl From<MessageType> for i64 {
    fn from(msg_type: MessageType) -> Self {
        match msg_type {
            MessageType::Authorization => 2,
            MessageType::SimpleRequestResponse => 3,
            MessageType::SimpleEvent => 4,
            MessageType::Create => 5,
            MessageType::Retrieve => 6,
            MessageType::Update => 7,
            MessageType::Delete => 8,
            MessageType::ServiceRegistration => 9,
            MessageType::ServiceAlive => 10,
            MessageType::Unknown => 11,
        }
    }
}

/// Online/offline state carried by state events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Online,
    Offline,
}

impl DeviceState {
    /// State named by the last path segment of a destination, e.g.
    /// `event:device-status/mac:112233445566/offline`.
    pub fn from_dest(dest: &str) -> Option<Self> {
        match dest.rsplit('/').next()? {
            "online" => Some(DeviceState::Online),
            "offline" => Some(DeviceState::Offline),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceState::Online => write!(f, "online"),
            DeviceState::Offline => write!(f, "offline"),
        }
    }
}

/// Decoded device message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeviceMessage {
    /// Message type code (11 = unknown)
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = i64, example = 4))]
    pub msg_type: MessageType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dest: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transaction_uuid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partner_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Base64-encoded payload
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = Byte))]
    pub payload: Vec<u8>,
}

/// Payload key carrying the reason a device went offline
pub const REASON_KEY: &str = "reason-for-closure";

/// One event as returned by the read path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ResolvedEvent {
    #[serde(flatten)]
    pub message: DeviceMessage,
    /// Unix seconds when the store received the message
    #[serde(with = "chrono::serde::ts_seconds")]
    #[cfg_attr(feature = "openapi", schema(value_type = i64, example = 1555639704))]
    pub birth_date: DateTime<Utc>,
    /// Derived from a state event's destination
    #[serde(skip)]
    pub state: Option<DeviceState>,
    /// Derived from a state event's payload
    #[serde(skip)]
    pub reason: Option<String>,
    #[serde(skip)]
    placeholder: bool,
}

impl ResolvedEvent {
    /// Stand-in for a record that could not be decrypted or decoded.
    pub fn placeholder(birth_date: DateTime<Utc>) -> Self {
        Self {
            message: DeviceMessage::default(),
            birth_date,
            state: None,
            reason: None,
            placeholder: true,
        }
    }

    /// Build from a decoded message. The birth date always comes from the
    /// record, never from the message.
    pub fn decoded(message: DeviceMessage, birth_date: DateTime<Utc>) -> Self {
        let (state, reason) = state_fields(&message);
        Self {
            message,
            birth_date,
            state,
            reason,
            placeholder: false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn msg_type(&self) -> MessageType {
        self.message.msg_type
    }
}

// A state needs both a state destination and a JSON object payload.
fn state_fields(message: &DeviceMessage) -> (Option<DeviceState>, Option<String>) {
    let Some(state) = DeviceState::from_dest(&message.dest) else {
        return (None, None);
    };

    match serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(&message.payload) {
        Ok(payload) => {
            let reason = payload
                .get(REASON_KEY)
                .and_then(serde_json::Value::as_str)
                .filter(|reason| !reason.is_empty())
                .map(str::to_owned);
            (Some(state), reason)
        }
        Err(_) => (None, None),
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => BASE64.decode(encoded).map_err(D::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
