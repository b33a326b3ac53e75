//! Provider selection and the config-keyed instance cache

use crate::local::LocalStorageProvider;
use crate::s3::S3StorageProvider;
use crate::sidecar::SidecarStorageProvider;
use crate::traits::StorageProvider;
use dataroom_core::{ProviderKind, Result, StorageConfig};
use dataroom_crypto::EnvelopeCrypto;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Create a provider instance for `config`
///
/// Misconfiguration surfaces here rather than on first use.
pub async fn create_provider(config: &StorageConfig) -> Result<Arc<dyn StorageProvider>> {
    match config.provider {
        ProviderKind::Local => Ok(Arc::new(LocalStorageProvider::new(config)?)),
        ProviderKind::S3 | ProviderKind::R2 => Ok(Arc::new(S3StorageProvider::new(config).await?)),
        ProviderKind::Sidecar => Ok(Arc::new(SidecarStorageProvider::new(config)?)),
    }
}

type Cached = (StorageConfig, Arc<dyn StorageProvider>);

/// Caches the last provider together with the config it was built from
///
/// A request with an equal config returns the cached instance. Any differing
/// field rebuilds it. Racing callers with a changed config may each build a
/// provider; the last swap wins and no caller sees a partial instance.
pub struct StorageFactory {
    cached: RwLock<Option<Cached>>,
}

impl StorageFactory {
    pub const fn new() -> Self {
        Self {
            cached: RwLock::new(None),
        }
    }

    /// Provider for `config`, reusing the cached one when configs are equal
    pub async fn get_provider(&self, config: &StorageConfig) -> Result<Arc<dyn StorageProvider>> {
        if let Some(existing) = self.lookup(config) {
            return Ok(existing);
        }

        let provider = create_provider(config).await?;
        info!("Built {} storage provider", provider.name());

        let mut guard = self.cached.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some((config.clone(), Arc::clone(&provider)));
        Ok(provider)
    }

    /// Drop the cached provider
    pub fn reset(&self) {
        let mut guard = self.cached.write().unwrap_or_else(|e| e.into_inner());
        if guard.take().is_some() {
            debug!("Storage provider cache cleared");
        }
    }

    /// Config the cached provider was built from
    pub fn cached_config(&self) -> Option<StorageConfig> {
        let guard = self.cached.read().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map(|(config, _)| config.clone())
    }

    fn lookup(&self, config: &StorageConfig) -> Option<Arc<dyn StorageProvider>> {
        let guard = self.cached.read().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some((cached, provider)) if cached == config => Some(Arc::clone(provider)),
            _ => None,
        }
    }
}

impl Default for StorageFactory {
    fn default() -> Self {
        Self::new()
    }
}

static FACTORY: StorageFactory = StorageFactory::new();

/// Process-wide factory
pub fn storage_factory() -> &'static StorageFactory {
    &FACTORY
}

/// Provider for the current process configuration
///
/// Configuration is re-read on every call, so rotated credentials are picked
/// up without a restart. Whenever the provider is rebuilt from a config that
/// carries `encryption_key`, the process-wide crypto service is re-seeded
/// from that key, so [`dataroom_crypto::crypto`] agrees with the provider.
pub async fn storage() -> Result<Arc<dyn StorageProvider>> {
    let config = StorageConfig::load(None)?;
    let rebuilt = FACTORY.lookup(&config).is_none();
    let provider = FACTORY.get_provider(&config).await?;

    if rebuilt {
        if let Some(secret) = config.encryption_key.as_deref().filter(|k| !k.is_empty()) {
            dataroom_crypto::set_crypto(Arc::new(EnvelopeCrypto::from_secret(secret)?));
            debug!("Seeded process crypto service from storage config");
        }
    }
    Ok(provider)
}

/// Drop the process-wide cached provider and crypto service
pub fn reset_storage() {
    FACTORY.reset();
    dataroom_crypto::reset_crypto();
}
