// Per-record failure counters
//
// Shared by every in-flight request, so each counter is an atomic.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Ways a single record can degrade to a placeholder or be skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// No decrypter registered for the record's algorithm and key id
    DecrypterMissing,
    /// The decrypter rejected the ciphertext
    Decrypt,
    /// The plaintext did not decode into a device message
    Decode,
    /// A state record decoded but carried no usable online/offline state
    UnknownState,
}

#[derive(Debug, Default)]
pub struct Measures {
    decrypter_missing: AtomicU64,
    decrypt_failure: AtomicU64,
    decode_failure: AtomicU64,
    unknown_state: AtomicU64,
}

impl Measures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, failure: Failure) {
        let counter = match failure {
            Failure::DecrypterMissing => &self.decrypter_missing,
            Failure::Decrypt => &self.decrypt_failure,
            Failure::Decode => &self.decode_failure,
            Failure::UnknownState => &self.unknown_state,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MeasuresSnapshot {
        MeasuresSnapshot {
            decrypter_missing: self.decrypter_missing.load(Ordering::Relaxed),
            decrypt_failure: self.decrypt_failure.load(Ordering::Relaxed),
            decode_failure: self.decode_failure.load(Ordering::Relaxed),
            unknown_state: self.unknown_state.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the failure counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct MeasuresSnapshot {
    pub decrypter_missing: u64,
    pub decrypt_failure: u64,
    pub decode_failure: u64,
    pub unknown_state: u64,
}
