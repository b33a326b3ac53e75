//! Shared fixtures for dataroom-crypto integration tests

#![allow(dead_code)]

use dataroom_crypto::EnvelopeCrypto;

/// A fixed 64-hex-character raw key
pub const RAW_KEY: &str = "6a1f0c9b3e7d2a58c4f1e0b9d8a7c6b5e4f3a2b1c0d9e8f7a6b5c4d3e2f1a0b9";

/// A low-entropy passphrase secret
pub const PASSPHRASE: &str = "dataroom-dev-passphrase";

/// Payload sizes around the AES block boundary plus larger documents
pub const PAYLOAD_SIZES: &[usize] = &[0, 1, 15, 16, 17, 4096, 1024 * 1024];

pub fn raw_crypto() -> EnvelopeCrypto {
    EnvelopeCrypto::from_secret(RAW_KEY).expect("raw key is valid")
}

pub fn passphrase_crypto() -> EnvelopeCrypto {
    EnvelopeCrypto::from_secret(PASSPHRASE).expect("passphrase is valid")
}

/// Deterministic, non-repeating payload of `len` bytes
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8).collect()
}
