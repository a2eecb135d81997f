#![allow(dead_code)]

use rand::rngs::OsRng;
use sealgate_service::{EncryptionService, ServiceConfig};
use sm2::SecretKey;
use sm2::elliptic_curve::sec1::ToEncodedPoint;
use std::sync::Arc;

pub fn public_key_hex() -> String {
    let secret = SecretKey::random(&mut OsRng);
    hex::encode(secret.public_key().to_encoded_point(true).as_bytes())
}

pub fn service() -> Arc<EncryptionService> {
    Arc::new(EncryptionService::new(&ServiceConfig::new(public_key_hex())).unwrap())
}

pub fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
