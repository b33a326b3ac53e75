//! Provider fixtures

use super::constants::*;
use camino::Utf8PathBuf;
use dataroom_core::{ProviderKind, StorageConfig};
use dataroom_storage::LocalStorageProvider;
use tempfile::TempDir;

/// Local config rooted in `dir`, encrypting with [`RAW_KEY`]
pub fn local_config(dir: &TempDir) -> StorageConfig {
    StorageConfig {
        provider: ProviderKind::Local,
        local_path: Some(dir.path().to_string_lossy().into_owned()),
        encryption_key: Some(RAW_KEY.to_string()),
        ..StorageConfig::default()
    }
}

/// Fresh temp dir and a local provider rooted in it
pub fn local_provider() -> (TempDir, LocalStorageProvider) {
    let dir = TempDir::new().expect("create temp dir");
    let provider = LocalStorageProvider::new(&local_config(&dir)).expect("local provider");
    (dir, provider)
}

pub fn root_of(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf-8 temp path")
}
