//! Shared fixtures for service integration tests.

#![allow(dead_code)]

use rand::rngs::OsRng;
use sealgate_crypto::{KeyGenerator, SymmetricKey};
use sealgate_service::{EncryptionService, ServiceConfig};
use sm2::SecretKey;
use sm2::elliptic_curve::sec1::ToEncodedPoint;

/// Hex of a freshly generated SM2 public key (compressed).
pub fn public_key_hex() -> String {
    let secret = SecretKey::random(&mut OsRng);
    hex::encode(secret.public_key().to_encoded_point(true).as_bytes())
}

pub fn config() -> ServiceConfig {
    ServiceConfig::new(public_key_hex())
}

pub fn service() -> EncryptionService {
    EncryptionService::new(&config()).expect("test config is valid")
}

/// Always hands out the same key.
pub struct FixedKeyGenerator(pub [u8; 16]);

impl KeyGenerator for FixedKeyGenerator {
    fn generate(&self) -> SymmetricKey {
        SymmetricKey::from_bytes(self.0)
    }
}
