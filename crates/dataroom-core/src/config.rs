//! Storage configuration loading
//!
//! Sources, lowest to highest precedence:
//! 1. Built-in defaults (local provider under `./.storage`)
//! 2. `storage:` section of `dataroom.yaml` (explicit path, or searched
//!    upwards from the current directory)
//! 3. Environment variables (`STORAGE_*`, with legacy aliases as fallbacks)

use crate::error::{Result, StorageError};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;
use std::str::FromStr;
use tracing::debug;

/// Configuration file names to search for
const CONFIG_FILE_NAMES: &[&str] = &["dataroom.yaml", "dataroom.yml"];

/// Default directory for the local provider
pub const DEFAULT_LOCAL_PATH: &str = "./.storage";

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Region R2 expects
pub const R2_REGION: &str = "auto";

/// Sidecar signing endpoint
pub const DEFAULT_SIDECAR_ENDPOINT: &str = "http://127.0.0.1:1106";

/// Base URL for local signed URLs
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

/// Canonical environment variable names
pub mod env {
    pub const PROVIDER: &str = "STORAGE_PROVIDER";
    pub const BUCKET: &str = "STORAGE_BUCKET";
    pub const REGION: &str = "STORAGE_REGION";
    pub const ENDPOINT: &str = "STORAGE_ENDPOINT";
    pub const ACCESS_KEY_ID: &str = "STORAGE_ACCESS_KEY_ID";
    pub const SECRET_ACCESS_KEY: &str = "STORAGE_SECRET_ACCESS_KEY";
    pub const LOCAL_PATH: &str = "STORAGE_LOCAL_PATH";
    pub const ENCRYPTION_KEY: &str = "STORAGE_ENCRYPTION_KEY";
    pub const SIDECAR_ENDPOINT: &str = "STORAGE_SIDECAR_ENDPOINT";
    pub const PUBLIC_BASE_URL: &str = "STORAGE_PUBLIC_BASE_URL";
}

/// Legacy names consulted only when the canonical variable is unset
const LEGACY_ALIASES: &[(&str, &str)] = &[
    (env::BUCKET, "AWS_S3_BUCKET"),
    (env::REGION, "AWS_REGION"),
    (env::ACCESS_KEY_ID, "AWS_ACCESS_KEY_ID"),
    (env::SECRET_ACCESS_KEY, "AWS_SECRET_ACCESS_KEY"),
    (env::ENDPOINT, "S3_ENDPOINT"),
    (env::ENCRYPTION_KEY, "DOCUMENT_ENCRYPTION_KEY"),
];

/// Storage backend selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local filesystem
    #[default]
    Local,
    /// AWS S3 or any S3-compatible endpoint
    #[serde(alias = "s3-compatible")]
    S3,
    /// Cloudflare R2 (S3-compatible, region `auto`)
    R2,
    /// Managed object storage reached through a signing sidecar
    #[serde(alias = "sidecar-managed", alias = "managed")]
    Sidecar,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::S3 => "s3",
            ProviderKind::R2 => "r2",
            ProviderKind::Sidecar => "sidecar",
        }
    }

    /// Backed by the S3 protocol
    pub fn is_s3_compatible(&self) -> bool {
        matches!(self, ProviderKind::S3 | ProviderKind::R2)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = StorageError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(ProviderKind::Local),
            "s3" | "s3-compatible" => Ok(ProviderKind::S3),
            "r2" => Ok(ProviderKind::R2),
            "sidecar" | "sidecar-managed" | "managed" => Ok(ProviderKind::Sidecar),
            _ => Err(StorageError::UnknownProvider {
                provider: s.to_string(),
            }),
        }
    }
}

/// Immutable description of which backend to use and its credentials
///
/// Equality is field-by-field; the provider factory rebuilds its cached
/// instance whenever any field differs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sidecar_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Local,
            bucket: None,
            region: None,
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            local_path: Some(DEFAULT_LOCAL_PATH.to_string()),
            encryption_key: None,
            sidecar_endpoint: None,
            public_base_url: None,
        }
    }
}

/// Shape of `dataroom.yaml`; only the `storage` section is read
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    storage: Option<StorageSection>,
}

/// Partial config from a file, overlaid field by field onto the defaults
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StorageSection {
    provider: Option<ProviderKind>,
    bucket: Option<String>,
    region: Option<String>,
    endpoint: Option<String>,
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    local_path: Option<String>,
    encryption_key: Option<String>,
    sidecar_endpoint: Option<String>,
    public_base_url: Option<String>,
}

impl StorageConfig {
    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with variables from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::default().with_overrides(lookup)
    }

    /// Defaults overlaid with the `storage:` section of a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml_ng::from_str(content)?;
        let mut config = Self::default();
        if let Some(section) = file.storage {
            config.merge_section(section);
        }
        Ok(config)
    }

    /// Load from defaults, an optional config file, then the environment
    ///
    /// An explicit `path` must exist. Without one, `dataroom.yaml` is searched
    /// for in the current and parent directories and skipped when absent.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        StorageError::invalid_config(format!("Configuration file not found: {}", p))
                    } else {
                        StorageError::Io(e)
                    }
                })?;
                debug!("Loading storage config from {}", p);
                Self::from_yaml(&content)?
            }
            None => match Self::find_config()? {
                Some((found, content)) => {
                    debug!("Loading storage config from {}", found);
                    Self::from_yaml(&content)?
                }
                None => Self::default(),
            },
        };

        config.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply environment-style overrides; empty values count as unset
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| -> Option<String> {
            lookup(name).filter(|v| !v.is_empty()).or_else(|| {
                LEGACY_ALIASES
                    .iter()
                    .find(|(canonical, _)| *canonical == name)
                    .and_then(|(_, legacy)| lookup(legacy))
                    .filter(|v| !v.is_empty())
            })
        };

        if let Some(provider) = get(env::PROVIDER) {
            self.provider = provider.parse()?;
        }

        let fields: [(&str, &mut Option<String>); 9] = [
            (env::BUCKET, &mut self.bucket),
            (env::REGION, &mut self.region),
            (env::ENDPOINT, &mut self.endpoint),
            (env::ACCESS_KEY_ID, &mut self.access_key_id),
            (env::SECRET_ACCESS_KEY, &mut self.secret_access_key),
            (env::LOCAL_PATH, &mut self.local_path),
            (env::ENCRYPTION_KEY, &mut self.encryption_key),
            (env::SIDECAR_ENDPOINT, &mut self.sidecar_endpoint),
            (env::PUBLIC_BASE_URL, &mut self.public_base_url),
        ];
        for (name, slot) in fields {
            if let Some(value) = get(name) {
                *slot = Some(value);
            }
        }

        Ok(self)
    }

    /// Check the fields the selected provider requires
    pub fn validate(&self) -> Result<()> {
        let provider = self.provider.as_str();
        match self.provider {
            ProviderKind::Local => {
                if self.local_path.as_deref().is_some_and(str::is_empty) {
                    return Err(StorageError::not_configured(provider, "local path"));
                }
            }
            ProviderKind::S3 => {
                require(provider, "bucket", &self.bucket)?;
            }
            ProviderKind::R2 => {
                require(provider, "bucket", &self.bucket)?;
                require(provider, "endpoint", &self.endpoint)?;
            }
            ProviderKind::Sidecar => {
                require(provider, "bucket", &self.bucket)?;
            }
        }

        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(StorageError::invalid_config(
                "access key id and secret access key must be set together",
            ));
        }

        Ok(())
    }

    /// Configured region, or the provider's default
    pub fn effective_region(&self) -> &str {
        match (&self.region, self.provider) {
            (Some(region), _) => region,
            (None, ProviderKind::R2) => R2_REGION,
            (None, _) => DEFAULT_REGION,
        }
    }

    pub fn effective_local_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.local_path.as_deref().unwrap_or(DEFAULT_LOCAL_PATH))
    }

    pub fn effective_sidecar_endpoint(&self) -> &str {
        self.sidecar_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_SIDECAR_ENDPOINT)
    }

    pub fn effective_public_base_url(&self) -> &str {
        self.public_base_url
            .as_deref()
            .unwrap_or(DEFAULT_PUBLIC_BASE_URL)
    }

    /// Copy safe to print, with credentials replaced by `***`
    pub fn redacted(&self) -> Self {
        let mask = |value: &Option<String>| redact(value).map(str::to_string);
        Self {
            access_key_id: mask(&self.access_key_id),
            secret_access_key: mask(&self.secret_access_key),
            encryption_key: mask(&self.encryption_key),
            ..self.clone()
        }
    }

    /// Search the current and parent directories for a config file
    fn find_config() -> Result<Option<(Utf8PathBuf, String)>> {
        let cwd = std::env::current_dir()?;
        let cwd = Utf8PathBuf::try_from(cwd).map_err(|_| {
            StorageError::invalid_config("Current directory path is not valid UTF-8")
        })?;

        let mut current = cwd.as_path();
        loop {
            for name in CONFIG_FILE_NAMES {
                let path = current.join(name);
                if path.exists() {
                    let content = fs::read_to_string(&path)?;
                    return Ok(Some((path, content)));
                }
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => return Ok(None),
            }
        }
    }

    fn merge_section(&mut self, section: StorageSection) {
        if let Some(provider) = section.provider {
            self.provider = provider;
        }
        let pairs = [
            (&mut self.bucket, section.bucket),
            (&mut self.region, section.region),
            (&mut self.endpoint, section.endpoint),
            (&mut self.access_key_id, section.access_key_id),
            (&mut self.secret_access_key, section.secret_access_key),
            (&mut self.local_path, section.local_path),
            (&mut self.encryption_key, section.encryption_key),
            (&mut self.sidecar_endpoint, section.sidecar_endpoint),
            (&mut self.public_base_url, section.public_base_url),
        ];
        for (slot, value) in pairs {
            if value.is_some() {
                *slot = value;
            }
        }
    }
}

fn require(provider: &str, field: &str, value: &Option<String>) -> Result<()> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(StorageError::not_configured(provider, field)),
    }
}

fn redact(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "***")
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("provider", &self.provider)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &redact(&self.access_key_id))
            .field("secret_access_key", &redact(&self.secret_access_key))
            .field("local_path", &self.local_path)
            .field("encryption_key", &redact(&self.encryption_key))
            .field("sidecar_endpoint", &self.sidecar_endpoint)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}
