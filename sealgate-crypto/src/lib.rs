//! Cryptographic primitives for Sealgate.
//!
//! Provides the three building blocks of the hybrid scheme:
//! - Symmetric key generation from the OS CSPRNG
//! - SM4-ECB payload encryption with PKCS#7 padding
//! - SM2 public-key wrapping of symmetric keys
//!
//! # Architecture
//!
//! Every payload is encrypted under a fresh 128-bit key. That key is then
//! sealed under a fixed SM2 public key; the base64 of the sealed form is the
//! caller-facing token. The matching private key is held elsewhere, so this
//! crate only ever wraps.

pub mod cipher;
pub mod envelope;
mod error;
mod key;

pub use cipher::{BLOCK_SIZE, decrypt, encrypt};
pub use envelope::WrappingKey;
pub use error::{CryptoError, CryptoResult};
pub use key::{KEY_SIZE, KeyGenerator, OsKeyGenerator, SymmetricKey, generate_symmetric_key};
