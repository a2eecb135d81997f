//! Symmetric key material and generation.

use rand::RngCore;
use rand::rngs::OsRng;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an SM4 key in bytes.
pub const KEY_SIZE: usize = 16;

/// A 128-bit SM4 key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Wraps raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Source of fresh symmetric keys.
///
/// The service takes one of these so tests can substitute a deterministic
/// source. Implementations must be usable from several threads at once.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> SymmetricKey;
}

/// Draws keys from the operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsKeyGenerator;

impl KeyGenerator for OsKeyGenerator {
    fn generate(&self) -> SymmetricKey {
        generate_symmetric_key()
    }
}

/// Generates a random 128-bit key from the OS CSPRNG.
pub fn generate_symmetric_key() -> SymmetricKey {
    let mut bytes = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut bytes);
    SymmetricKey { bytes }
}
