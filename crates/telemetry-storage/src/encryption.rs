// AES-256-GCM decrypters and key ring loading.
// Each stored record names the key id it was encrypted under; every key that may
// still appear in the store has to be registered for those records to decode.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use std::sync::Arc;
use telemetry_core::{Algorithm, CipherError, Ciphers, Decrypter, NoopDecrypter};

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

/// AES-256-GCM cipher bound to one key id.
#[derive(Clone)]
pub struct AesGcmDecrypter {
    key_id: String,
    cipher: Aes256Gcm,
}

impl AesGcmDecrypter {
    /// Create from raw key bytes (must be 32 bytes).
    pub fn new(key_id: impl Into<String>, key: &[u8]) -> Result<Self, CipherError> {
        let key_id = key_id.into();
        if key.len() != KEY_SIZE {
            return Err(CipherError::InvalidKey(format!(
                "key must be {} bytes, got {} bytes for key_id '{}'",
                KEY_SIZE,
                key.len(),
                key_id
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CipherError::InvalidKey(format!("key_id '{}': {}", key_id, e)))?;

        Ok(Self { key_id, cipher })
    }

    /// Parse a versioned key string in format "key_id:base64_key"
    pub fn from_versioned_key(key_str: &str) -> Result<Self, CipherError> {
        let (key_id, encoded) = key_str.split_once(':').ok_or_else(|| {
            CipherError::InvalidKey(format!(
                "expected 'key_id:base64_key', got: {}",
                if key_str.chars().count() > 20 {
                    format!("{}...", key_str.chars().take(20).collect::<String>())
                } else {
                    key_str.to_string()
                }
            ))
        })?;

        if key_id.is_empty() {
            return Err(CipherError::InvalidKey("empty key_id".to_string()));
        }

        let key_bytes = BASE64.decode(encoded.trim()).map_err(|e| {
            CipherError::InvalidKey(format!("key_id '{}' is not valid base64: {}", key_id, e))
        })?;

        Self::new(key_id, &key_bytes)
    }

    /// Encrypt plaintext under a fresh random nonce.
    /// Returns (ciphertext, nonce) as stored on a record.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CipherError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| CipherError::Encrypt)?;

        Ok((ciphertext, nonce_bytes.to_vec()))
    }
}

impl Decrypter for AesGcmDecrypter {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Aes256Gcm
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn decrypt(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CipherError> {
        // Nonce::from_slice panics on a wrong length
        if nonce.len() != NONCE_SIZE {
            return Err(CipherError::InvalidNonce {
                expected: NONCE_SIZE,
                actual: nonce.len(),
            });
        }

        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Decrypt)
    }
}

/// Generate a new random key in versioned format.
/// Returns format: "key_id:base64_key"
pub fn generate_decryption_key(key_id: &str) -> String {
    let mut key = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    format!("{}:{}", key_id, BASE64.encode(key))
}

/// Which decrypters to register at startup
#[derive(Debug, Clone, Default)]
pub struct CipherConfig {
    /// Versioned AES-256-GCM keys ("key_id:base64_key")
    pub keys: Vec<String>,
    /// Register the identity decrypter for unencrypted records
    pub allow_none: bool,
}

impl CipherConfig {
    /// Create from environment variables.
    /// - DECRYPTION_KEYS: comma-separated "key_id:base64_key" entries (optional)
    /// - DECRYPTION_ALLOW_NONE: register the identity decrypter (default: true)
    pub fn from_env() -> Result<Self> {
        let keys = std::env::var("DECRYPTION_KEYS")
            .ok()
            .map(|value| parse_key_list(&value))
            .unwrap_or_default();

        let allow_none = match std::env::var("DECRYPTION_ALLOW_NONE") {
            Ok(value) => value
                .parse::<bool>()
                .with_context(|| format!("Invalid DECRYPTION_ALLOW_NONE value: {}", value))?,
            Err(_) => true,
        };

        Ok(Self { keys, allow_none })
    }

    /// Build the decrypter registry
    pub fn build(&self) -> Result<Ciphers> {
        let mut ciphers = Ciphers::new();

        if self.allow_none {
            ciphers.register(Arc::new(NoopDecrypter::default()))?;
        }

        for key in &self.keys {
            let decrypter = AesGcmDecrypter::from_versioned_key(key)
                .context("Failed to load decryption key")?;
            ciphers.register(Arc::new(decrypter))?;
        }

        tracing::debug!(keys = ?ciphers.keys(), "Decrypters registered");
        Ok(ciphers)
    }
}

fn parse_key_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(id: &str) -> AesGcmDecrypter {
        AesGcmDecrypter::from_versioned_key(&generate_decryption_key(id)).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = test_key("kek-v1");

        let plaintext = br#"{"msg_type":4}"#;
        let (ciphertext, nonce) = cipher.encrypt(plaintext).unwrap();
        let decrypted = cipher.decrypt(&ciphertext, &nonce).unwrap();

        assert_eq!(decrypted, plaintext);
        assert_ne!(ciphertext, plaintext.to_vec());
    }

    #[test]
    fn test_different_ciphertext() {
        let cipher = test_key("kek-v1");

        let (encrypted1, nonce1) = cipher.encrypt(b"same-plaintext").unwrap();
        let (encrypted2, nonce2) = cipher.encrypt(b"same-plaintext").unwrap();

        // Same plaintext should produce different ciphertext (different nonces)
        assert_ne!(nonce1, nonce2);
        assert_ne!(encrypted1, encrypted2);
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher_v1 = test_key("kek-v1");
        let cipher_v2 = test_key("kek-v2");

        let (ciphertext, nonce) = cipher_v1.encrypt(b"secret").unwrap();
        let result = cipher_v2.decrypt(&ciphertext, &nonce);

        assert!(matches!(result, Err(CipherError::Decrypt)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = test_key("kek-v1");

        let (mut ciphertext, nonce) = cipher.encrypt(b"secret").unwrap();
        ciphertext[0] ^= 0xff;

        assert!(matches!(
            cipher.decrypt(&ciphertext, &nonce),
            Err(CipherError::Decrypt)
        ));
    }

    #[test]
    fn test_bad_nonce_length() {
        let cipher = test_key("kek-v1");
        let (ciphertext, _) = cipher.encrypt(b"secret").unwrap();

        assert!(matches!(
            cipher.decrypt(&ciphertext, &[0u8; 4]),
            Err(CipherError::InvalidNonce {
                expected: 12,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_invalid_key_format() {
        // Missing colon
        assert!(AesGcmDecrypter::from_versioned_key("no-colon-here").is_err());

        // Invalid base64
        assert!(AesGcmDecrypter::from_versioned_key("kek-v1:not-valid-base64!!!").is_err());

        // Wrong key length
        let short_key = format!("kek-v1:{}", BASE64.encode([0u8; 16]));
        assert!(AesGcmDecrypter::from_versioned_key(&short_key).is_err());

        // Missing key id
        let no_id = format!(":{}", BASE64.encode([0u8; 32]));
        assert!(AesGcmDecrypter::from_versioned_key(&no_id).is_err());
    }

    #[test]
    fn test_build_registry_with_rotated_keys() {
        let config = CipherConfig {
            keys: vec![
                generate_decryption_key("kek-v2"),
                generate_decryption_key("kek-v1"),
            ],
            allow_none: true,
        };

        let ciphers = config.build().unwrap();

        assert_eq!(ciphers.len(), 3);
        assert!(ciphers.get(Algorithm::Aes256Gcm, "kek-v1").is_some());
        assert!(ciphers.get(Algorithm::Aes256Gcm, "kek-v2").is_some());
        assert!(ciphers.get(Algorithm::None, "none").is_some());
    }

    #[test]
    fn test_build_without_none() {
        let config = CipherConfig {
            keys: vec![generate_decryption_key("kek-v1")],
            allow_none: false,
        };

        let ciphers = config.build().unwrap();
        assert!(ciphers.lookup("none", "none").is_none());
    }

    #[test]
    fn test_duplicate_key_id() {
        let config = CipherConfig {
            keys: vec![
                generate_decryption_key("kek-v1"),
                generate_decryption_key("kek-v1"),
            ],
            allow_none: false,
        };

        assert!(config.build().is_err());
    }

    #[test]
    fn test_parse_key_list() {
        assert_eq!(
            parse_key_list(" kek-v1:abc , ,kek-v2:def"),
            vec!["kek-v1:abc".to_string(), "kek-v2:def".to_string()]
        );
        assert!(parse_key_list("").is_empty());
    }

    #[test]
    fn test_generate_key() {
        let key1 = generate_decryption_key("kek-v1");
        let key2 = generate_decryption_key("kek-v1");

        // Keys should be different
        assert_ne!(key1, key2);

        // Both should be valid
        assert!(AesGcmDecrypter::from_versioned_key(&key1).is_ok());
        assert!(AesGcmDecrypter::from_versioned_key(&key2).is_ok());
    }
}
