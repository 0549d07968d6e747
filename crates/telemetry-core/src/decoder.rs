// Protocol decoder seam
//
// Decrypted record bytes are decoded into a DeviceMessage. The default decoder
// reads JSON; other wire formats plug in through MessageDecoder.

use crate::event::DeviceMessage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Empty message")]
    Empty,

    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decodes plaintext bytes into a structured device message
pub trait MessageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DeviceMessage, DecodeError>;
}

/// JSON decoder for device messages
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonMessageDecoder;

impl MessageDecoder for JsonMessageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DeviceMessage, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(serde_json::from_slice(bytes)?)
    }
}
