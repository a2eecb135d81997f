//! End-to-end behavior of EncryptionService: round trips, single-use
//! tokens, failure handling, and concurrent redemption.

mod support;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use sealgate_crypto::{CryptoError, WrappingKey};
use sealgate_service::{EncryptionService, ErrorKind, KeyRegistry, ServiceError};
use std::collections::HashSet;
use std::sync::Arc;
use support::FixedKeyGenerator;

// ── Scenarios ──

#[test]
fn hello_roundtrip_then_token_consumed() {
    let svc = support::service();
    let sealed = svc.encrypt("hello").unwrap();

    assert_eq!(svc.decrypt(&sealed.ciphertext, &sealed.token).unwrap(), "hello");
    assert_eq!(
        svc.decrypt(&sealed.ciphertext, &sealed.token).unwrap_err(),
        ServiceError::KeyNotFound
    );
}

#[test]
fn empty_plaintext_has_padded_ciphertext() {
    let svc = support::service();
    let sealed = svc.encrypt("").unwrap();

    assert!(!sealed.ciphertext.is_empty());
    assert_eq!(STANDARD.decode(&sealed.ciphertext).unwrap().len(), 16);
    assert_eq!(svc.decrypt(&sealed.ciphertext, &sealed.token).unwrap(), "");
}

#[test]
fn multibyte_unicode_roundtrip() {
    let svc = support::service();
    let text = "加密测试 — ünïcödé ✓ 🦀";
    let sealed = svc.encrypt(text).unwrap();
    assert_eq!(svc.decrypt(&sealed.ciphertext, &sealed.token).unwrap(), text);
}

#[test]
fn bytes_roundtrip_allows_non_utf8() {
    let svc = support::service();
    let payload = [0xFFu8, 0x00, 0xFE, 0x80];
    let sealed = svc.encrypt_bytes(&payload).unwrap();
    assert_eq!(svc.decrypt_bytes(&sealed.ciphertext, &sealed.token).unwrap(), payload);
}

// ── Registry lifecycle ──

#[test]
fn encrypt_registers_and_decrypt_consumes() {
    let svc = support::service();
    assert_eq!(svc.pending_keys(), 0);

    let a = svc.encrypt("a").unwrap();
    let b = svc.encrypt("b").unwrap();
    assert_eq!(svc.pending_keys(), 2);
    assert!(svc.registry().contains(&a.token));

    svc.decrypt(&a.ciphertext, &a.token).unwrap();
    assert_eq!(svc.pending_keys(), 1);
    assert!(!svc.registry().contains(&a.token));
    assert!(svc.registry().contains(&b.token));
}

#[test]
fn unknown_token_is_key_not_found() {
    let svc = support::service();
    let sealed = svc.encrypt("payload").unwrap();

    let err = svc.decrypt(&sealed.ciphertext, "not-a-real-token").unwrap_err();
    assert_eq!(err, ServiceError::KeyNotFound);
    assert_eq!(err.kind(), ErrorKind::KeyNotFound);
    assert_eq!(svc.pending_keys(), 1, "unrelated entry untouched");
}

#[test]
fn token_lookup_precedes_ciphertext_decoding() {
    let svc = support::service();
    let err = svc.decrypt("%%% not base64 %%%", "unknown").unwrap_err();
    assert_eq!(err, ServiceError::KeyNotFound);
}

#[test]
fn malformed_base64_leaves_token_active() {
    let svc = support::service();
    let sealed = svc.encrypt("retry me").unwrap();

    let err = svc.decrypt("%%% not base64 %%%", &sealed.token).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encoding);

    // Corrected input still works.
    assert_eq!(svc.decrypt(&sealed.ciphertext, &sealed.token).unwrap(), "retry me");
}

#[test]
fn bad_block_length_leaves_token_active() {
    let svc = support::service();
    let sealed = svc.encrypt("retry me").unwrap();

    let short = STANDARD.encode([0u8; 15]);
    let err = svc.decrypt(&short, &sealed.token).unwrap_err();
    assert_eq!(
        err,
        ServiceError::Crypto(CryptoError::InvalidCiphertextLength(15))
    );
    assert!(svc.registry().contains(&sealed.token));
}

#[test]
fn ciphertext_from_other_key_does_not_decrypt_to_its_plaintext() {
    let svc = support::service();
    let first = svc.encrypt("first secret message").unwrap();
    let second = svc.encrypt("second").unwrap();

    match svc.decrypt(&first.ciphertext, &second.token) {
        Err(e) => {
            assert_eq!(e.kind(), ErrorKind::Crypto);
            assert!(svc.registry().contains(&second.token));
        }
        Ok(text) => assert_ne!(text, "first secret message"),
    }
}

// ── Tokens ──

#[test]
fn tokens_unique_across_many_encrypts() {
    let svc = support::service();
    let tokens: HashSet<String> = (0..150)
        .map(|i| svc.encrypt(&format!("message {}", i % 3)).unwrap().token)
        .collect();
    assert_eq!(tokens.len(), 150);
    assert_eq!(svc.pending_keys(), 150);
}

#[test]
fn tokens_unique_even_when_keys_repeat() {
    let wrapping = WrappingKey::from_hex(&support::public_key_hex()).unwrap();
    let svc = EncryptionService::with_parts(
        wrapping,
        KeyRegistry::new(),
        Arc::new(FixedKeyGenerator([3; 16])),
    );

    let a = svc.encrypt("same").unwrap();
    let b = svc.encrypt("same").unwrap();
    assert_eq!(a.ciphertext, b.ciphertext, "same key, same ECB output");
    assert_ne!(a.token, b.token, "wrapping is randomized");
    assert_eq!(svc.pending_keys(), 2);
}

#[test]
fn services_have_independent_registries() {
    let svc_a = support::service();
    let svc_b = support::service();
    let sealed = svc_a.encrypt("scoped").unwrap();

    assert_eq!(
        svc_b.decrypt(&sealed.ciphertext, &sealed.token).unwrap_err(),
        ServiceError::KeyNotFound
    );
    assert_eq!(svc_a.decrypt(&sealed.ciphertext, &sealed.token).unwrap(), "scoped");
}

// ── Concurrency ──

#[test]
fn concurrent_decrypts_of_one_token_succeed_once() {
    let svc = Arc::new(support::service());
    let sealed = svc.encrypt("only once").unwrap();

    let successes = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let svc = Arc::clone(&svc);
                let sealed = sealed.clone();
                scope.spawn(move || svc.decrypt(&sealed.ciphertext, &sealed.token))
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| match r {
                Ok(text) => {
                    assert_eq!(text, "only once");
                    true
                }
                Err(e) => {
                    assert_eq!(*e, ServiceError::KeyNotFound);
                    false
                }
            })
            .count()
    });

    assert_eq!(successes, 1);
    assert_eq!(svc.pending_keys(), 0);
}

#[test]
fn concurrent_pairs_stay_isolated() {
    let svc = Arc::new(support::service());

    std::thread::scope(|scope| {
        for i in 0..32 {
            let svc = Arc::clone(&svc);
            scope.spawn(move || {
                let text = format!("request-{i}");
                let sealed = svc.encrypt(&text).unwrap();
                assert_eq!(svc.decrypt(&sealed.ciphertext, &sealed.token).unwrap(), text);
            });
        }
    });

    assert_eq!(svc.pending_keys(), 0);
}

// ── Properties ──

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn roundtrip_any_text(text in any::<String>()) {
        let svc = support::service();
        let sealed = svc.encrypt(&text).unwrap();
        prop_assert_eq!(svc.decrypt(&sealed.ciphertext, &sealed.token).unwrap(), text);
    }

    #[test]
    fn tampering_never_yields_original(
        text in "[a-zA-Z0-9 ]{0,64}",
        position in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let svc = support::service();
        let sealed = svc.encrypt(&text).unwrap();

        let mut raw = STANDARD.decode(&sealed.ciphertext).unwrap();
        let i = position.index(raw.len());
        raw[i] ^= flip;
        let tampered = STANDARD.encode(&raw);

        match svc.decrypt(&tampered, &sealed.token) {
            Ok(recovered) => prop_assert_ne!(recovered, text),
            Err(e) => prop_assert_eq!(e.kind(), ErrorKind::Crypto),
        }
    }
}
