//! Error types for the crypto layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised by key handling, SM4 payload encryption, or SM2 key wrapping.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid ciphertext length: {0} bytes is not a non-zero multiple of the block size")]
    InvalidCiphertextLength(usize),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("key wrap failed: {0}")]
    Wrap(String),
}
