//! Envelope crypto behaviour tests
//!
//! Tests cover:
//! - Round-trips in raw-key and passphrase modes across payload sizes
//! - Tamper detection on every bit of the tag and ciphertext
//! - Reading legacy `0x00` and headerless buffers
//! - Malformed buffers rejected before any cipher work

mod common;

use common::*;
use dataroom_crypto::blob::{BlobFormat, IV_SIZE, SALT_SIZE, TAG_SIZE};
use dataroom_crypto::{CryptoError, EncryptedBlob};

#[test]
fn test_roundtrip_all_sizes_both_modes() {
    for crypto in [raw_crypto(), passphrase_crypto()] {
        for &size in PAYLOAD_SIZES {
            let plaintext = payload(size);
            let buffer = crypto.encrypt_to_buffer(&plaintext).unwrap();
            let decrypted = crypto.decrypt_from_buffer(&buffer).unwrap();
            assert_eq!(decrypted, plaintext, "roundtrip failed for {} bytes", size);
        }
    }
}

#[test]
fn test_hello_world_raw_key_scenario() {
    let crypto = raw_crypto();
    let buffer = crypto.encrypt_to_buffer(b"hello world").unwrap();

    assert_eq!(buffer[0], 0x00);
    assert_eq!(buffer.len(), 1 + IV_SIZE + TAG_SIZE + 11);
    assert_eq!(crypto.decrypt_from_buffer(&buffer).unwrap(), b"hello world");
}

#[test]
fn test_passphrase_mode_fresh_salt_per_call() {
    let crypto = passphrase_crypto();

    let first = crypto.encrypt_to_buffer(b"hello world").unwrap();
    let second = crypto.encrypt_to_buffer(b"hello world").unwrap();

    let a = EncryptedBlob::parse(&first).unwrap();
    let b = EncryptedBlob::parse(&second).unwrap();
    assert_eq!(a.format, BlobFormat::Derived);
    assert_eq!(b.format, BlobFormat::Derived);
    assert_ne!(a.salt, b.salt);
    assert_ne!(a.ciphertext, b.ciphertext);

    assert_eq!(crypto.decrypt_from_buffer(&first).unwrap(), b"hello world");
    assert_eq!(crypto.decrypt_from_buffer(&second).unwrap(), b"hello world");
}

#[test]
fn test_same_passphrase_decrypts_across_instances() {
    let writer = passphrase_crypto();
    let reader = passphrase_crypto();

    let buffer = writer.encrypt_to_buffer(b"K-1 2025").unwrap();
    assert_eq!(reader.decrypt_from_buffer(&buffer).unwrap(), b"K-1 2025");
}

#[test]
fn test_every_bit_flip_is_detected() {
    for crypto in [raw_crypto(), passphrase_crypto()] {
        let buffer = crypto.encrypt_to_buffer(b"wire instructions").unwrap();

        for byte in 0..buffer.len() {
            for bit in 0..8 {
                let mut tampered = buffer.clone();
                tampered[byte] ^= 1 << bit;
                let result = crypto.decrypt_from_buffer(&tampered);
                assert!(
                    result.is_err(),
                    "flip of byte {} bit {} returned plaintext",
                    byte,
                    bit
                );
            }
        }
    }
}

#[test]
fn test_tag_and_ciphertext_flips_report_authentication_failure() {
    let crypto = raw_crypto();
    let buffer = crypto.encrypt_to_buffer(b"bank account").unwrap();
    let tag_start = 1 + IV_SIZE;

    for index in tag_start..buffer.len() {
        let mut tampered = buffer.clone();
        tampered[index] ^= 0x80;
        assert_eq!(
            crypto.decrypt_from_buffer(&tampered),
            Err(CryptoError::AuthenticationFailed)
        );
    }
}

#[test]
fn test_legacy_master_format_is_readable() {
    let writer = raw_crypto();
    let legacy = writer.encrypt_to_buffer(b"legacy document").unwrap();
    assert_eq!(EncryptedBlob::parse(&legacy).unwrap().format, BlobFormat::Master);

    // A separately constructed service with the same key reads it back
    let reader = raw_crypto();
    assert_eq!(reader.decrypt_from_buffer(&legacy).unwrap(), b"legacy document");
}

#[test]
fn test_headerless_legacy_buffer_is_accepted() {
    let crypto = raw_crypto();

    // The oldest format has no version byte; only an IV whose first byte
    // cannot be read as 0x00/0x01 is unambiguous.
    let payload = loop {
        let candidate = crypto.encrypt(b"signed NDA").unwrap();
        if candidate.iv[0] > 0x01 {
            break candidate;
        }
    };

    let mut buffer = Vec::new();
    buffer.extend_from_slice(&payload.iv);
    buffer.extend_from_slice(&payload.auth_tag);
    buffer.extend_from_slice(&payload.ciphertext);

    assert_eq!(
        EncryptedBlob::parse(&buffer).unwrap().format,
        BlobFormat::Headerless
    );
    assert_eq!(crypto.decrypt_from_buffer(&buffer).unwrap(), b"signed NDA");
}

#[test]
fn test_derived_blob_readable_by_raw_key_instance_with_salt() {
    // Raw-key instances still honour a salt when one is present
    let crypto = raw_crypto();
    let payload = crypto.encrypt(b"x").unwrap();
    assert!(payload.salt.is_none());

    let salt = [9u8; SALT_SIZE];
    let result = crypto.decrypt(&payload.ciphertext, &payload.iv, &payload.auth_tag, Some(&salt));
    assert_eq!(result, Err(CryptoError::AuthenticationFailed));
}

#[test]
fn test_truncated_buffers_are_malformed_not_tampered() {
    let crypto = passphrase_crypto();
    let buffer = crypto.encrypt_to_buffer(b"truncate me").unwrap();

    let truncated = &buffer[..BlobFormat::Derived.min_len() - 1];
    let err = crypto.decrypt_from_buffer(truncated).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidEncryptedData { .. }));
    assert!(!err.is_integrity_failure());

    let err = crypto.decrypt_from_buffer(&[0x00; 10]).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidEncryptedData { .. }));

    let err = crypto.decrypt_from_buffer(&[]).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidEncryptedData { .. }));
}

#[test]
fn test_cross_mode_decryption_fails() {
    let raw = raw_crypto();
    let passphrase = passphrase_crypto();

    let buffer = raw.encrypt_to_buffer(b"mode mismatch").unwrap();
    assert!(passphrase.decrypt_from_buffer(&buffer).is_err());

    let buffer = passphrase.encrypt_to_buffer(b"mode mismatch").unwrap();
    assert!(raw.decrypt_from_buffer(&buffer).is_err());
}
