//! Hybrid encrypt/decrypt orchestration.
//!
//! `encrypt` generates a fresh SM4 key, encrypts the payload, wraps the key
//! under the configured SM2 public key and registers `token → key`.
//! `decrypt` resolves the key through the registry and consumes the entry
//! only once decryption has fully succeeded, so a failed attempt can be
//! retried with corrected input.

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::key_registry::KeyRegistry;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sealgate_crypto::{CryptoError, KeyGenerator, OsKeyGenerator, WrappingKey, cipher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Output of an encrypt call. Both fields are standard base64.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sealed {
    pub ciphertext: String,
    pub token: String,
}

/// Encrypts payloads under single-use keys and resolves them on decrypt.
pub struct EncryptionService {
    wrapping_key: WrappingKey,
    registry: KeyRegistry,
    generator: Arc<dyn KeyGenerator>,
    warn_threshold: Option<usize>,
}

impl EncryptionService {
    /// Builds a service from config, failing fast on a bad wrapping key.
    pub fn new(config: &ServiceConfig) -> ServiceResult<Self> {
        let wrapping_key = config.validate()?;
        debug!(public_key = %wrapping_key.to_hex_compressed(), "encryption service configured");
        Ok(Self::with_parts(wrapping_key, KeyRegistry::new(), Arc::new(OsKeyGenerator))
            .with_warn_threshold(config.registry_warn_threshold))
    }

    /// Builds a service from already-validated parts.
    pub fn with_parts(
        wrapping_key: WrappingKey,
        registry: KeyRegistry,
        generator: Arc<dyn KeyGenerator>,
    ) -> Self {
        Self {
            wrapping_key,
            registry,
            generator,
            warn_threshold: None,
        }
    }

    /// Sets the registry size above which each encrypt logs a warning.
    pub fn with_warn_threshold(mut self, threshold: Option<usize>) -> Self {
        self.warn_threshold = threshold;
        self
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Number of tokens issued but not yet consumed.
    pub fn pending_keys(&self) -> usize {
        self.registry.len()
    }

    /// Encrypts UTF-8 text.
    pub fn encrypt(&self, plaintext: &str) -> ServiceResult<Sealed> {
        self.encrypt_bytes(plaintext.as_bytes())
    }

    /// Encrypts raw bytes.
    ///
    /// Nothing is registered unless every step succeeds.
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> ServiceResult<Sealed> {
        let key = self.generator.generate();
        let ciphertext = STANDARD.encode(cipher::encrypt(&key, plaintext)?);
        let token = self.wrapping_key.wrap(&key)?;

        self.registry.insert(token.clone(), key);

        let pending = self.registry.len();
        if let Some(threshold) = self.warn_threshold
            && pending > threshold
        {
            warn!(pending, threshold, "key registry above warning threshold");
        }
        debug!(plaintext_len = plaintext.len(), pending, "payload encrypted");

        Ok(Sealed { ciphertext, token })
    }

    /// Decrypts to UTF-8 text and consumes the token.
    ///
    /// Output that is not valid UTF-8 means the ciphertext did not come from
    /// this key; it is reported as a crypto failure and the token stays live.
    pub fn decrypt(&self, ciphertext: &str, token: &str) -> ServiceResult<String> {
        let bytes = self.open(ciphertext, token)?;
        let plaintext = String::from_utf8(bytes).map_err(|_| {
            ServiceError::Crypto(CryptoError::Decryption(
                "plaintext is not valid UTF-8".to_string(),
            ))
        })?;
        self.consume(token)?;
        debug!(plaintext_len = plaintext.len(), "payload decrypted");
        Ok(plaintext)
    }

    /// Decrypts to raw bytes and consumes the token.
    pub fn decrypt_bytes(&self, ciphertext: &str, token: &str) -> ServiceResult<Vec<u8>> {
        let plaintext = self.open(ciphertext, token)?;
        self.consume(token)?;
        debug!(plaintext_len = plaintext.len(), "payload decrypted");
        Ok(plaintext)
    }

    fn open(&self, ciphertext: &str, token: &str) -> ServiceResult<Vec<u8>> {
        let key = self.registry.get(token).inspect_err(|_| {
            warn!("decrypt requested for unknown or consumed token");
        })?;

        let raw = STANDARD
            .decode(ciphertext)
            .map_err(|e| ServiceError::Encoding(format!("ciphertext is not valid base64: {e}")))?;

        cipher::decrypt(&key, &raw)
            .map_err(ServiceError::from)
            .inspect_err(|e| warn!(error = %e, "decrypt failed, token left active"))
    }

    // Two decrypts may race past `open` for the same token; only the one
    // that actually removes the entry is allowed to succeed.
    fn consume(&self, token: &str) -> ServiceResult<()> {
        match self.registry.remove(token) {
            Some(_) => Ok(()),
            None => {
                warn!("token consumed by a concurrent decrypt");
                Err(ServiceError::KeyNotFound)
            }
        }
    }
}

impl fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionService")
            .field("wrapping_key", &self.wrapping_key)
            .field("registry", &self.registry)
            .field("warn_threshold", &self.warn_threshold)
            .finish_non_exhaustive()
    }
}
