//! Hybrid encryption service for Sealgate.
//!
//! Ties the crypto primitives together into a two-call protocol:
//! - `encrypt(text)` → base64 ciphertext plus a base64 wrap token
//! - `decrypt(ciphertext, token)` → original text, consuming the token
//!
//! Each service instance owns its own key registry. Tokens are single use:
//! once a decrypt succeeds, the same token is rejected with
//! [`ServiceError::KeyNotFound`]. Tokens that are never redeemed stay in the
//! registry for the life of the service.

pub mod config;
pub mod error;
pub mod key_registry;
pub mod service;

pub use config::ServiceConfig;
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use key_registry::KeyRegistry;
pub use service::{EncryptionService, Sealed};
