//! Host-facing adapters over [`EncryptionService`].
//!
//! Hosts hand over positional string arguments, the way a scripting
//! runtime passes call arguments. Two adapters exist:
//! - [`DirectBridge`]: runs the operation on the caller's thread and returns
//!   a tagged [`BridgeResponse`].
//! - [`DeferredBridge`]: returns a [`Pending`] handle at once and runs the
//!   operation on a worker pool; the handle resolves or rejects later.
//!
//! [`EncryptionService`]: sealgate_service::EncryptionService

mod deferred;
mod direct;

pub use deferred::{DeferredBridge, Pending, Rejection};
pub use direct::DirectBridge;

use sealgate_service::{ErrorKind, ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};

/// Tagged result returned by the direct bridge.
///
/// Serializes as `{"status":"ok","value":...}` or
/// `{"status":"error","kind":"...","message":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BridgeResponse<T> {
    Ok { value: T },
    Error { kind: ErrorKind, message: String },
}

impl<T> BridgeResponse<T> {
    pub fn from_result(result: ServiceResult<T>) -> Self {
        match result {
            Ok(value) => BridgeResponse::Ok { value },
            Err(e) => BridgeResponse::Error {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, BridgeResponse::Ok { .. })
    }

    /// Returns the error kind, if this is a failure.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            BridgeResponse::Ok { .. } => None,
            BridgeResponse::Error { kind, .. } => Some(*kind),
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            BridgeResponse::Ok { value } => Some(value),
            BridgeResponse::Error { .. } => None,
        }
    }
}

/// Extracts the plaintext argument of an encrypt call.
fn encrypt_args(args: &[String]) -> ServiceResult<&str> {
    match args {
        [text, ..] => Ok(text.as_str()),
        [] => Err(ServiceError::InvalidArguments(
            "encrypt requires the text to encrypt".to_string(),
        )),
    }
}

/// Extracts the ciphertext and token arguments of a decrypt call.
fn decrypt_args(args: &[String]) -> ServiceResult<(&str, &str)> {
    match args {
        [ciphertext, token, ..] => Ok((ciphertext.as_str(), token.as_str())),
        _ => Err(ServiceError::InvalidArguments(format!(
            "decrypt requires ciphertext and token, got {} argument(s)",
            args.len()
        ))),
    }
}
