//! Service error types.

use sealgate_crypto::CryptoError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors that can occur while encrypting or decrypting through the service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("no key registered for token")]
    KeyNotFound,

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Stable, serializable classification of a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArguments,
    Encoding,
    Crypto,
    KeyNotFound,
    Config,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidArguments(_) => ErrorKind::InvalidArguments,
            ServiceError::Encoding(_) => ErrorKind::Encoding,
            ServiceError::Crypto(_) => ErrorKind::Crypto,
            ServiceError::KeyNotFound => ErrorKind::KeyNotFound,
            ServiceError::Config(_) => ErrorKind::Config,
        }
    }
}
