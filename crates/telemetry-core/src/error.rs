// Error types for the device read path

use thiserror::Error;

/// Result type alias for read operations
pub type Result<T> = std::result::Result<T, ReadError>;

/// Category the boundary layer maps to a transport status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Internal,
}

/// Errors that cross the core boundary.
///
/// Per-record decrypt and decode failures never show up here; they are
/// absorbed into placeholder events.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The record store query itself failed
    #[error("Failed to get events for device id {device_id}: {source}")]
    Upstream {
        device_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// Nothing usable survived filtering and resolution
    #[error("No events found for device id {device_id}")]
    NotFound { device_id: String },
}

impl ReadError {
    /// Wrap a record store failure
    pub fn upstream(device_id: impl Into<String>, source: anyhow::Error) -> Self {
        ReadError::Upstream {
            device_id: device_id.into(),
            source,
        }
    }

    /// Create a not found error
    pub fn not_found(device_id: impl Into<String>) -> Self {
        ReadError::NotFound {
            device_id: device_id.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ReadError::Upstream { .. } => ErrorClass::Internal,
            ReadError::NotFound { .. } => ErrorClass::NotFound,
        }
    }

    pub fn device_id(&self) -> &str {
        match self {
            ReadError::Upstream { device_id, .. } | ReadError::NotFound { device_id } => device_id,
        }
    }
}
