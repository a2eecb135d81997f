//! Synchronous bridge: the result is ready when the call returns.

use super::{BridgeResponse, decrypt_args, encrypt_args};
use sealgate_service::{EncryptionService, Sealed, ServiceResult};
use std::sync::Arc;
use tracing::error;

/// Runs requests on the caller's thread.
#[derive(Clone, Debug)]
pub struct DirectBridge {
    service: Arc<EncryptionService>,
}

impl DirectBridge {
    pub fn new(service: Arc<EncryptionService>) -> Self {
        Self { service }
    }

    /// `encrypt(text) -> {ciphertext, token}`
    pub fn encrypt(&self, args: &[String]) -> BridgeResponse<Sealed> {
        let result = encrypt_args(args).and_then(|text| self.service.encrypt(text));
        respond("encrypt", result)
    }

    /// `decrypt(ciphertext, token) -> text`
    pub fn decrypt(&self, args: &[String]) -> BridgeResponse<String> {
        let result = decrypt_args(args)
            .and_then(|(ciphertext, token)| self.service.decrypt(ciphertext, token));
        respond("decrypt", result)
    }
}

fn respond<T>(op: &'static str, result: ServiceResult<T>) -> BridgeResponse<T> {
    if let Err(e) = &result {
        error!(op, kind = ?e.kind(), "{e}");
    }
    BridgeResponse::from_result(result)
}
