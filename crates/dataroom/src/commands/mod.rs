//! Command implementations

pub mod config;
pub mod crypto;
pub mod object;
pub mod url;

use anyhow::{Context, Result};
use bytes::Bytes;
use camino::Utf8Path;
use dataroom_core::StorageConfig;
use dataroom_storage::{storage_factory, StorageProvider};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Resolved configuration for this invocation
pub(crate) fn load_config(path: Option<&Utf8Path>) -> Result<StorageConfig> {
    let config = StorageConfig::load(path).context("Failed to load storage configuration")?;
    debug!("Resolved storage config: {:?}", config);
    Ok(config)
}

/// Provider for the resolved configuration
pub(crate) async fn open_provider(path: Option<&Utf8Path>) -> Result<Arc<dyn StorageProvider>> {
    let config = load_config(path)?;
    storage_factory()
        .get_provider(&config)
        .await
        .with_context(|| format!("Failed to initialize {} storage", config.provider))
}

/// Contents of `path`, or stdin when it is `-`
pub(crate) async fn read_input(path: &Utf8Path) -> Result<Bytes> {
    if path.as_str() == "-" {
        let mut buf = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut buf)
            .await
            .context("Failed to read stdin")?;
        return Ok(Bytes::from(buf));
    }

    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;
    Ok(Bytes::from(data))
}
