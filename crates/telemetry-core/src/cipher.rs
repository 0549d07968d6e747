// Decrypter capability and registry
//
// Records carry the algorithm and key id they were encrypted with. The
// registry maps that (algorithm, key id) pair to a Decrypter so records written
// under rotated keys stay readable as long as the old key is registered.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Encryption algorithms a record can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Payload stored in the clear
    None,
    /// AES-256-GCM with a 12-byte nonce
    Aes256Gcm,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::None => "none",
            Algorithm::Aes256Gcm => "aes-256-gcm",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Algorithm::None),
            "aes-256-gcm" | "aes256gcm" => Ok(Algorithm::Aes256Gcm),
            _ => Err(CipherError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Errors raised by decrypters and while building the registry
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid nonce: expected {expected} bytes, got {actual}")]
    InvalidNonce { expected: usize, actual: usize },

    #[error("Decryption failed (data may be corrupted)")]
    Decrypt,

    #[error("Encryption failed")]
    Encrypt,

    #[error("Duplicate decrypter for algorithm '{alg}' and key id '{key_id}'")]
    Duplicate { alg: Algorithm, key_id: String },
}

/// Turns a record's ciphertext back into message bytes.
pub trait Decrypter: Send + Sync {
    /// Algorithm this decrypter handles
    fn algorithm(&self) -> Algorithm;

    /// Key id this decrypter was built from
    fn key_id(&self) -> &str;

    /// Decrypt `ciphertext` using the per-record `nonce`
    fn decrypt(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// Key id conventionally used for unencrypted records
pub const NONE_KEY_ID: &str = "none";

/// Identity decrypter for records stored without encryption.
#[derive(Debug, Clone)]
pub struct NoopDecrypter {
    key_id: String,
}

impl NoopDecrypter {
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
        }
    }
}

impl Default for NoopDecrypter {
    fn default() -> Self {
        Self::new(NONE_KEY_ID)
    }
}

impl Decrypter for NoopDecrypter {
    fn algorithm(&self) -> Algorithm {
        Algorithm::None
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn decrypt(&self, ciphertext: &[u8], _nonce: &[u8]) -> Result<Vec<u8>, CipherError> {
        Ok(ciphertext.to_vec())
    }
}

/// Registry of decrypters keyed by (algorithm, key id).
///
/// Built once at startup and shared read-only between requests.
#[derive(Clone, Default)]
pub struct Ciphers {
    decrypters: HashMap<(Algorithm, String), Arc<dyn Decrypter>>,
}

impl Ciphers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decrypter under its own algorithm and key id.
    pub fn register(&mut self, decrypter: Arc<dyn Decrypter>) -> Result<(), CipherError> {
        let key = (decrypter.algorithm(), decrypter.key_id().to_string());
        if self.decrypters.contains_key(&key) {
            return Err(CipherError::Duplicate {
                alg: key.0,
                key_id: key.1,
            });
        }
        self.decrypters.insert(key, decrypter);
        Ok(())
    }

    /// Builder-style registration
    pub fn with_decrypter(
        mut self,
        decrypter: impl Decrypter + 'static,
    ) -> Result<Self, CipherError> {
        self.register(Arc::new(decrypter))?;
        Ok(self)
    }

    pub fn get(&self, alg: Algorithm, key_id: &str) -> Option<Arc<dyn Decrypter>> {
        self.decrypters.get(&(alg, key_id.to_string())).cloned()
    }

    /// Look up by the algorithm name stored on a record.
    /// An unrecognised algorithm name is a miss, same as an unknown key id.
    pub fn lookup(&self, alg: &str, key_id: &str) -> Option<Arc<dyn Decrypter>> {
        let alg = alg.parse::<Algorithm>().ok()?;
        self.get(alg, key_id)
    }

    pub fn len(&self) -> usize {
        self.decrypters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decrypters.is_empty()
    }

    /// Registered (algorithm, key id) pairs, sorted for stable output
    pub fn keys(&self) -> Vec<(Algorithm, &str)> {
        let mut keys: Vec<_> = self
            .decrypters
            .keys()
            .map(|(alg, key_id)| (*alg, key_id.as_str()))
            .collect();
        keys.sort_by(|a, b| (a.0.as_str(), a.1).cmp(&(b.0.as_str(), b.1)));
        keys
    }
}

impl fmt::Debug for Ciphers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ciphers")
            .field("keys", &self.keys())
            .finish()
    }
}
