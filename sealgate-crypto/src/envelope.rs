//! SM2 key wrapping.
//!
//! Seals a symmetric key under a fixed SM2 public key using the public-key
//! encryption scheme of GB/T 32918.4. Each seal draws a fresh ephemeral
//! scalar, so wrapping the same key twice yields different tokens. The
//! private key never lives in this process and no unwrap is offered.
//!
//! Wire layout (before base64): the GM/T 0009 DER structure
//! `SEQUENCE { x INTEGER, y INTEGER, hash OCTET STRING, cipher OCTET STRING }`
//! holding the ephemeral point C1, the SM3 check value C3 and the masked
//! key C2.

use crate::error::{CryptoError, CryptoResult};
use crate::key::SymmetricKey;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use der::asn1::{OctetStringRef, UintRef};
use der::{Encode, Sequence};
use rand::rngs::OsRng;
use sm2::elliptic_curve::sec1::ToEncodedPoint;
use sm2::{AffinePoint, NonZeroScalar, ProjectivePoint, PublicKey};
use sm3::{Digest, Sm3};
use std::fmt;

/// Length of the SM3 check value C3.
pub const C3_LEN: usize = 32;

/// DER form of an SM2 ciphertext.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Sm2Ciphertext<'a> {
    /// C1 x coordinate.
    pub x: UintRef<'a>,
    /// C1 y coordinate.
    pub y: UintRef<'a>,
    /// C3.
    pub hash: OctetStringRef<'a>,
    /// C2.
    pub cipher: OctetStringRef<'a>,
}

fn der_error(e: der::Error) -> CryptoError {
    CryptoError::Wrap(format!("DER encoding failed: {e}"))
}

/// A validated SM2 public key used to wrap symmetric keys.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappingKey {
    key: PublicKey,
}

impl WrappingKey {
    /// Parses a hex-encoded SEC1 point, compressed or uncompressed.
    pub fn from_hex(hex_str: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| CryptoError::InvalidPublicKey(format!("not valid hex: {e}")))?;
        Self::from_sec1_bytes(&bytes)
    }

    /// Parses a SEC1-encoded point.
    pub fn from_sec1_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let key = PublicKey::from_sec1_bytes(bytes).map_err(|_| {
            CryptoError::InvalidPublicKey(format!(
                "{} bytes do not encode a point on the SM2 curve",
                bytes.len()
            ))
        })?;
        Ok(Self { key })
    }

    /// Returns the compressed SEC1 encoding as lowercase hex.
    pub fn to_hex_compressed(&self) -> String {
        hex::encode(self.key.to_encoded_point(true).as_bytes())
    }

    /// Wraps `key` and returns the base64 token.
    pub fn wrap(&self, key: &SymmetricKey) -> CryptoResult<String> {
        let sealed = self.seal(key.as_bytes())?;
        Ok(STANDARD.encode(sealed))
    }

    fn seal(&self, msg: &[u8]) -> CryptoResult<Vec<u8>> {
        let recipient = self.key.to_projective();

        loop {
            let k = NonZeroScalar::random(&mut OsRng);
            let c1 = (ProjectivePoint::GENERATOR * *k).to_affine();
            let shared = (recipient * *k).to_affine();
            let (x2, y2) = affine_coordinates(&shared)?;

            let mut z = Vec::with_capacity(64);
            z.extend_from_slice(&x2);
            z.extend_from_slice(&y2);
            let mask = kdf(&z, msg.len());
            if !mask.is_empty() && mask.iter().all(|b| *b == 0) {
                continue;
            }

            let c2: Vec<u8> = msg.iter().zip(&mask).map(|(m, t)| m ^ t).collect();
            let c3 = Sm3::new()
                .chain_update(x2)
                .chain_update(msg)
                .chain_update(y2)
                .finalize();

            let (x1, y1) = affine_coordinates(&c1)?;
            let out = Sm2Ciphertext {
                x: UintRef::new(&x1).map_err(der_error)?,
                y: UintRef::new(&y1).map_err(der_error)?,
                hash: OctetStringRef::new(&c3).map_err(der_error)?,
                cipher: OctetStringRef::new(&c2).map_err(der_error)?,
            }
            .to_der()
            .map_err(der_error)?;
            return Ok(out);
        }
    }
}

impl fmt::Debug for WrappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WrappingKey")
            .field(&self.to_hex_compressed())
            .finish()
    }
}

fn affine_coordinates(point: &AffinePoint) -> CryptoResult<(Vec<u8>, Vec<u8>)> {
    let encoded = point.to_encoded_point(false);
    match (encoded.x(), encoded.y()) {
        (Some(x), Some(y)) => Ok((x.to_vec(), y.to_vec())),
        _ => Err(CryptoError::Wrap("point is the identity".to_string())),
    }
}

/// SM3-based key derivation function from GB/T 32918.4 section 5.4.3.
fn kdf(z: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut counter: u32 = 1;
    while out.len() < len {
        let block = Sm3::new()
            .chain_update(z)
            .chain_update(counter.to_be_bytes())
            .finalize();
        let take = (len - out.len()).min(block.len());
        out.extend_from_slice(&block[..take]);
        counter += 1;
    }
    out
}
