// Device Telemetry Read Path
//
// This crate provides a DB-agnostic implementation of the device event read
// path: stored records are decrypted, decoded and aggregated into either the
// full list of a device's events or its current online/offline status.
//
// Key design decisions:
// - Uses traits (RecordGetter, Decrypter, MessageDecoder) for pluggable backends
// - Decrypters are looked up by (algorithm, key id) in the Ciphers registry
// - Resolving one record never fails; bad records become Unknown-type placeholders
// - Errors crossing the boundary carry an ErrorClass (not found vs internal)
// - Failure counters are atomics shared by all requests

pub mod cipher;
pub mod decoder;
pub mod error;
pub mod event;
pub mod expiry;
pub mod measures;
pub mod reader;
pub mod record;
pub mod resolver;
pub mod status;
pub mod traits;

// In-memory record store for tests and local runs
pub mod memory;

// Re-exports for convenience
pub use cipher::{Algorithm, CipherError, Ciphers, Decrypter, NoopDecrypter, NONE_KEY_ID};
pub use decoder::{DecodeError, JsonMessageDecoder, MessageDecoder};
pub use error::{ErrorClass, ReadError, Result};
pub use event::{DeviceMessage, DeviceState, MessageType, ResolvedEvent};
pub use expiry::filter_expired;
pub use measures::{Failure, Measures, MeasuresSnapshot};
pub use memory::InMemoryRecordStore;
pub use reader::{EventReader, DEFAULT_GET_LIMIT};
pub use record::{timestamp_from_unix, EventType, RawRecord};
pub use resolver::RecordResolver;
pub use status::{derive_status, DeviceStatus, StatusSnapshot};
pub use traits::RecordGetter;
