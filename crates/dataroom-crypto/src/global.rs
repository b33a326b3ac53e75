//! Process-wide crypto service accessor
//!
//! The master key is expensive to derive in passphrase mode, so one
//! [`EnvelopeCrypto`] is built lazily from the environment and shared. Tests
//! call [`reset_crypto`] (or [`set_crypto`]) to isolate themselves.

use crate::envelope::EnvelopeCrypto;
use crate::error::Result;
use std::sync::{Arc, RwLock};

static CRYPTO: RwLock<Option<Arc<EnvelopeCrypto>>> = RwLock::new(None);

/// Shared crypto service, built from `STORAGE_ENCRYPTION_KEY` on first use
///
/// Only the environment is consulted here. A key that lives solely in a
/// config file reaches this singleton when the storage layer installs it
/// through [`set_crypto`] while building a provider from that config.
pub fn crypto() -> Result<Arc<EnvelopeCrypto>> {
    {
        let guard = CRYPTO.read().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = guard.as_ref() {
            return Ok(Arc::clone(existing));
        }
    }

    let mut guard = CRYPTO.write().unwrap_or_else(|e| e.into_inner());
    if let Some(existing) = guard.as_ref() {
        return Ok(Arc::clone(existing));
    }

    let built = Arc::new(EnvelopeCrypto::from_env()?);
    *guard = Some(Arc::clone(&built));
    Ok(built)
}

/// Install an explicit crypto service as the process singleton
pub fn set_crypto(service: Arc<EnvelopeCrypto>) {
    let mut guard = CRYPTO.write().unwrap_or_else(|e| e.into_inner());
    *guard = Some(service);
}

/// Drop the singleton so the next [`crypto`] call rebuilds it
pub fn reset_crypto() {
    let mut guard = CRYPTO.write().unwrap_or_else(|e| e.into_inner());
    *guard = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{ENCRYPTION_KEY_ENV, LEGACY_ENCRYPTION_KEY_ENV};
    use crate::error::CryptoError;
    use serial_test::serial;

    const RAW_KEY: &str = "ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100";

    #[test]
    #[serial]
    fn test_singleton_is_shared_until_reset() {
        std::env::set_var(ENCRYPTION_KEY_ENV, RAW_KEY);
        reset_crypto();

        let a = crypto().unwrap();
        let b = crypto().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        reset_crypto();
        let c = crypto().unwrap();
        assert!(!Arc::ptr_eq(&a, &c));

        std::env::remove_var(ENCRYPTION_KEY_ENV);
        reset_crypto();
    }

    #[test]
    #[serial]
    fn test_missing_key_errors() {
        std::env::remove_var(ENCRYPTION_KEY_ENV);
        std::env::remove_var(LEGACY_ENCRYPTION_KEY_ENV);
        reset_crypto();

        assert_eq!(crypto().unwrap_err(), CryptoError::MissingKey);
    }

    #[test]
    #[serial]
    fn test_set_crypto_overrides_environment() {
        std::env::remove_var(ENCRYPTION_KEY_ENV);
        let explicit = Arc::new(EnvelopeCrypto::from_secret(RAW_KEY).unwrap());
        set_crypto(Arc::clone(&explicit));

        assert!(Arc::ptr_eq(&crypto().unwrap(), &explicit));
        reset_crypto();
    }
}
