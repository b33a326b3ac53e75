//! Error types for dataroom-crypto

use thiserror::Error;

/// Result type alias using dataroom-crypto's error type
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Failures raised by the envelope crypto service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Buffer does not match the layout implied by its version byte
    #[error("Invalid encrypted data: {reason}")]
    InvalidEncryptedData { reason: String },

    /// The GCM authentication tag did not verify
    #[error("Authentication failed: encrypted data was tampered with or is corrupt")]
    AuthenticationFailed,

    /// Key material or envelope parts are unusable
    #[error("Invalid key material: {reason}")]
    InvalidKey { reason: String },

    /// HKDF expansion failed
    #[error("Key derivation failed: {reason}")]
    KeyDerivation { reason: String },

    /// No key was supplied and none is configured
    #[error("No encryption key configured (set STORAGE_ENCRYPTION_KEY)")]
    MissingKey,

    /// Encryption-side AEAD failure
    #[error("Encryption failed: {reason}")]
    Cipher { reason: String },
}

impl CryptoError {
    /// Create an invalid encrypted data error
    pub fn invalid_data(reason: impl Into<String>) -> Self {
        Self::InvalidEncryptedData {
            reason: reason.into(),
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }

    /// Create a key derivation error
    pub fn key_derivation(reason: impl Into<String>) -> Self {
        Self::KeyDerivation {
            reason: reason.into(),
        }
    }

    /// Create a cipher error
    pub fn cipher(reason: impl Into<String>) -> Self {
        Self::Cipher {
            reason: reason.into(),
        }
    }

    /// True when the failure means the bytes were tampered with or corrupted,
    /// as opposed to a malformed buffer or a configuration problem.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_failure_classification() {
        assert!(CryptoError::AuthenticationFailed.is_integrity_failure());
        assert!(!CryptoError::invalid_data("too short").is_integrity_failure());
        assert!(!CryptoError::MissingKey.is_integrity_failure());
    }

    #[test]
    fn test_error_messages() {
        let err = CryptoError::invalid_data("buffer too short for version 0x01");
        assert_eq!(
            err.to_string(),
            "Invalid encrypted data: buffer too short for version 0x01"
        );
    }
}
