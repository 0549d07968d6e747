// Postgres storage layer with sqlx
//
// This crate provides the production collaborators of the read path:
// - Database: implements RecordGetter over the events table
// - AesGcmDecrypter / CipherConfig: AES-256-GCM decrypters and key ring loading

pub mod encryption;
pub mod models;
pub mod repositories;

pub use encryption::{generate_decryption_key, AesGcmDecrypter, CipherConfig};
pub use models::*;
pub use repositories::*;

/// Schema of the events table
pub const EVENTS_SCHEMA: &str = include_str!("../migrations/001_events.sql");
