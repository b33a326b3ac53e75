//! Encryption handle shared by providers

use bytes::Bytes;
use dataroom_core::{Result, StorageConfig};
use dataroom_crypto::EnvelopeCrypto;
use std::sync::Arc;

/// Crypto service a provider encrypts and decrypts with
///
/// A provider built from a config carrying `encryption_key` owns a service
/// made from that key. Otherwise the process-wide service is resolved on
/// first use, so providers that never encrypt never need a key.
#[derive(Debug, Clone, Default)]
pub struct CryptoHandle {
    explicit: Option<Arc<EnvelopeCrypto>>,
}

impl CryptoHandle {
    /// Handle resolving to the process-wide service
    pub fn global() -> Self {
        Self { explicit: None }
    }

    /// Handle bound to a specific service
    pub fn with(service: Arc<EnvelopeCrypto>) -> Self {
        Self {
            explicit: Some(service),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.encryption_key.as_deref().filter(|k| !k.is_empty()) {
            Some(secret) => Ok(Self::with(Arc::new(EnvelopeCrypto::from_secret(secret)?))),
            None => Ok(Self::global()),
        }
    }

    pub fn resolve(&self) -> Result<Arc<EnvelopeCrypto>> {
        match &self.explicit {
            Some(service) => Ok(Arc::clone(service)),
            None => Ok(dataroom_crypto::crypto()?),
        }
    }

    /// Bytes to store: the wire-format ciphertext when `encrypt` is set
    pub fn seal(&self, data: Bytes, encrypt: bool) -> Result<Bytes> {
        if !encrypt {
            return Ok(data);
        }
        Ok(Bytes::from(self.resolve()?.encrypt_to_buffer(&data)?))
    }

    /// Bytes to return: the plaintext when `decrypt` is set
    pub fn open(&self, data: Bytes, decrypt: bool) -> Result<Bytes> {
        if !decrypt {
            return Ok(data);
        }
        Ok(Bytes::from(self.resolve()?.decrypt_from_buffer(&data)?))
    }
}
