//! # dataroom-crypto
//!
//! Envelope encryption for dataroom storage:
//! - AES-256-GCM authenticated encryption (16-byte IV, 16-byte tag)
//! - Raw 256-bit keys or PBKDF2 + HKDF derived per-object keys
//! - Versioned single-buffer wire format with legacy read support
//! - SHA-256 content hashing

pub mod blob;
pub mod envelope;
pub mod error;
pub mod global;
pub mod hash;

pub use blob::{BlobFormat, EncryptedBlob};
pub use envelope::{generate_key, EncryptedPayload, EnvelopeCrypto};
pub use error::{CryptoError, Result};
pub use global::{crypto, reset_crypto, set_crypto};
pub use hash::{hash, verify_hash};
