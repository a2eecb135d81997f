//! Service configuration.

use crate::error::{ServiceError, ServiceResult};
use sealgate_crypto::WrappingKey;
use serde::{Deserialize, Serialize};

/// Environment variable holding the hex-encoded SM2 wrapping key.
pub const ENV_PUBLIC_KEY: &str = "SEALGATE_PUBLIC_KEY";
/// Environment variable for [`ServiceConfig::registry_warn_threshold`].
pub const ENV_REGISTRY_WARN_THRESHOLD: &str = "SEALGATE_REGISTRY_WARN_THRESHOLD";
/// Environment variable for [`ServiceConfig::worker_threads`].
pub const ENV_WORKER_THREADS: &str = "SEALGATE_WORKER_THREADS";

/// Configuration for the encryption service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// SM2 public key as hex (SEC1, compressed or uncompressed).
    pub public_key_hex: String,

    /// Log a warning once the key registry holds more entries than this.
    /// Nothing is evicted.
    pub registry_warn_threshold: Option<usize>,

    /// Worker threads for deferred requests (runtime default if unset).
    pub worker_threads: Option<usize>,
}

impl ServiceConfig {
    /// Creates a config with only the wrapping key set.
    pub fn new(public_key_hex: impl Into<String>) -> Self {
        Self {
            public_key_hex: public_key_hex.into(),
            ..Self::default()
        }
    }

    /// Parses a config from JSON.
    pub fn from_json(json: &str) -> ServiceResult<Self> {
        serde_json::from_str(json).map_err(|e| ServiceError::Config(format!("malformed JSON: {e}")))
    }

    /// Reads the config from `SEALGATE_*` environment variables.
    pub fn from_env() -> ServiceResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ServiceResult<Self> {
        let public_key_hex = lookup(ENV_PUBLIC_KEY)
            .ok_or_else(|| ServiceError::Config(format!("{ENV_PUBLIC_KEY} is not set")))?;

        Ok(Self {
            public_key_hex,
            registry_warn_threshold: parse_optional(&lookup, ENV_REGISTRY_WARN_THRESHOLD)?,
            worker_threads: parse_optional(&lookup, ENV_WORKER_THREADS)?,
        })
    }

    /// Validates the config and returns the parsed wrapping key.
    pub fn validate(&self) -> ServiceResult<WrappingKey> {
        if self.public_key_hex.trim().is_empty() {
            return Err(ServiceError::Config("public_key_hex is empty".to_string()));
        }
        if self.worker_threads == Some(0) {
            return Err(ServiceError::Config("worker_threads must be at least 1".to_string()));
        }
        Ok(WrappingKey::from_hex(&self.public_key_hex)?)
    }
}

fn parse_optional(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> ServiceResult<Option<usize>> {
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ServiceError::Config(format!("{name} must be a non-negative integer, got {raw:?}"))),
    }
}
