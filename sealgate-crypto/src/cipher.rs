//! SM4 payload encryption in ECB mode with PKCS#7 padding.
//!
//! ECB encrypts every 16-byte block independently, so equal plaintext blocks
//! under the same key produce equal ciphertext blocks. That leakage is part
//! of the wire contract callers depend on; it is not an oversight.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{KEY_SIZE, SymmetricKey};
use ecb::cipher::block_padding::Pkcs7;
use ecb::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use sm4::Sm4;

/// SM4 block size in bytes.
pub const BLOCK_SIZE: usize = 16;

type Sm4EcbEnc = ecb::Encryptor<Sm4>;
type Sm4EcbDec = ecb::Decryptor<Sm4>;

/// Encrypts `plaintext` under `key`. Always returns at least one block.
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    encrypt_with_key_bytes(key.as_bytes(), plaintext)
}

/// Decrypts `ciphertext` under `key` and strips the padding.
pub fn decrypt(key: &SymmetricKey, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    decrypt_with_key_bytes(key.as_bytes(), ciphertext)
}

/// Encrypts with a raw key slice, rejecting anything but a 16-byte key.
pub fn encrypt_with_key_bytes(key: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Sm4EcbEnc::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: KEY_SIZE,
        actual: key.len(),
    })?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypts with a raw key slice, rejecting anything but a 16-byte key.
pub fn decrypt_with_key_bytes(key: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = Sm4EcbDec::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: KEY_SIZE,
        actual: key.len(),
    })?;

    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidCiphertextLength(ciphertext.len()));
    }

    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::Decryption("invalid padding (wrong key or tampered data)".to_string()))
}
