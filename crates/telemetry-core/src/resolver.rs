// Per-record resolution
//
// decrypter lookup -> decrypt -> decode, for one record. Any failure is logged,
// counted and turned into a placeholder event so one bad record never fails
// the request.

use std::sync::Arc;
use thiserror::Error;

use crate::cipher::{CipherError, Ciphers};
use crate::decoder::{DecodeError, MessageDecoder};
use crate::event::ResolvedEvent;
use crate::measures::{Failure, Measures};
use crate::record::RawRecord;

#[derive(Debug, Error)]
enum ResolveError {
    #[error("no decrypter for algorithm '{alg}' and key id '{key_id}'")]
    DecrypterMissing { alg: String, key_id: String },

    #[error("failed to decrypt event: {0}")]
    Decrypt(#[source] CipherError),

    #[error("failed to decode decrypted event: {0}")]
    Decode(#[source] DecodeError),
}

impl ResolveError {
    fn failure(&self) -> Failure {
        match self {
            ResolveError::DecrypterMissing { .. } => Failure::DecrypterMissing,
            ResolveError::Decrypt(_) => Failure::Decrypt,
            ResolveError::Decode(_) => Failure::Decode,
        }
    }
}

/// Turns raw records into resolved events.
#[derive(Clone)]
pub struct RecordResolver {
    ciphers: Arc<Ciphers>,
    decoder: Arc<dyn MessageDecoder>,
    measures: Arc<Measures>,
}

impl RecordResolver {
    pub fn new(
        ciphers: Arc<Ciphers>,
        decoder: Arc<dyn MessageDecoder>,
        measures: Arc<Measures>,
    ) -> Self {
        Self {
            ciphers,
            decoder,
            measures,
        }
    }

    pub fn measures(&self) -> &Arc<Measures> {
        &self.measures
    }

    /// Resolve one record. Never fails: every record yields exactly one event.
    pub fn resolve(&self, record: &RawRecord) -> ResolvedEvent {
        match self.try_resolve(record) {
            Ok(event) => event,
            Err(e) => {
                self.measures.record(e.failure());
                tracing::error!(
                    device_id = %record.device_id,
                    record_id = record.id,
                    alg = %record.alg,
                    key_id = %record.key_id,
                    error = %e,
                    "Failed to resolve event record"
                );
                ResolvedEvent::placeholder(record.birth_date)
            }
        }
    }

    fn try_resolve(&self, record: &RawRecord) -> Result<ResolvedEvent, ResolveError> {
        let decrypter = self
            .ciphers
            .lookup(&record.alg, &record.key_id)
            .ok_or_else(|| ResolveError::DecrypterMissing {
                alg: record.alg.clone(),
                key_id: record.key_id.clone(),
            })?;

        let plaintext = decrypter
            .decrypt(&record.data, &record.nonce)
            .map_err(ResolveError::Decrypt)?;

        let message = self
            .decoder
            .decode(&plaintext)
            .map_err(ResolveError::Decode)?;

        Ok(ResolvedEvent::decoded(message, record.birth_date))
    }
}
