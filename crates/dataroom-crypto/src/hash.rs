//! SHA-256 content hashing for integrity checks

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as 64 lowercase hex characters
pub fn hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check `data` against an expected hex digest (case-insensitive)
pub fn verify_hash(data: &[u8], expected: &str) -> bool {
    hash(data).eq_ignore_ascii_case(expected.trim())
}
