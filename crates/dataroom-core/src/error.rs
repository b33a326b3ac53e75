//! Error types for dataroom storage

use dataroom_crypto::CryptoError;
use thiserror::Error;

/// Result type alias using dataroom-core's Error type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage subsystem errors
///
/// "Not found" is never represented here: providers report it as `None`,
/// `false` or an empty listing.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A provider was built without a field it requires
    #[error("{provider} storage is not configured: missing {field}")]
    NotConfigured { provider: String, field: String },

    /// Invalid configuration value
    #[error("Invalid storage configuration: {message}")]
    InvalidConfig { message: String },

    /// Unknown provider name
    #[error("Unknown storage provider: {provider}. Valid providers: local, s3, r2, sidecar")]
    UnknownProvider { provider: String },

    /// Object key cannot be used by this backend
    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Copy source does not exist
    #[error("Source object not found: {key}")]
    SourceNotFound { key: String },

    /// Encryption, decryption or malformed blob
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Stored content does not hash to the expected value
    #[error("Integrity check failed for {key}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Non-success HTTP response
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// HTTP transport failure
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Failure reported by a backend SDK
    #[error("{provider} {operation} failed: {message}")]
    Backend {
        provider: String,
        operation: String,
        message: String,
    },

    /// Operation the backend cannot perform
    #[error("{provider} storage does not support {operation}")]
    Unsupported { provider: String, operation: String },

    /// Signed URL used after its expiry
    #[error("Signed URL has expired")]
    SignedUrlExpired,

    /// Signed URL signature or parameters are wrong
    #[error("Signed URL is invalid: {reason}")]
    SignedUrlInvalid { reason: String },
}

impl StorageError {
    /// Create a not configured error
    pub fn not_configured(provider: impl Into<String>, field: impl Into<String>) -> Self {
        Self::NotConfigured {
            provider: provider.into(),
            field: field.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http(status: u16, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            url: url.into(),
            body: body.into(),
        }
    }

    /// Create a backend error
    pub fn backend(
        provider: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            provider: provider.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(provider: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            provider: provider.into(),
            operation: operation.into(),
        }
    }

    /// Create a signed URL rejection
    pub fn signed_url_invalid(reason: impl Into<String>) -> Self {
        Self::SignedUrlInvalid {
            reason: reason.into(),
        }
    }

    /// True for tampered or corrupt content, which must not be retried
    pub fn is_integrity_failure(&self) -> bool {
        match self {
            Self::Crypto(e) => e.is_integrity_failure(),
            Self::IntegrityMismatch { .. } => true,
            _ => false,
        }
    }

    /// True for failures a caller should report as a configuration problem
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured { .. }
                | Self::InvalidConfig { .. }
                | Self::UnknownProvider { .. }
                | Self::Crypto(CryptoError::MissingKey)
        )
    }
}
