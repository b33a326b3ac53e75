//! Local filesystem provider
//!
//! Objects live at `<root>/<key>`; content type and caller metadata, when
//! supplied, go to a sibling `<root>/<key>.meta.json`. Keys are sanitized
//! before touching the filesystem so nothing resolves outside `root`.

use crate::crypto::CryptoHandle;
use crate::signed_url::{now_ms, SignedUrlRequest, UrlSigner};
use crate::traits::StorageProvider;
use async_trait::async_trait;
use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use dataroom_core::{
    GetOptions, HttpMethod, ListOptions, ListResult, PutOptions, PutResult, Result,
    SignedUrlOptions, StorageConfig, StorageError, StorageObjectInfo,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use tokio::fs;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Suffix of metadata sidecar files
pub const META_SUFFIX: &str = ".meta.json";

/// Contents of `<key>.meta.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<HashMap<String, String>>,
    created_at: DateTime<Utc>,
}

/// Outcome of serving a verified signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedResponse {
    /// GET of an existing object (stored bytes, not decrypted)
    Content(Bytes),
    /// GET or HEAD of a missing object
    NotFound,
    /// HEAD of an existing object
    Found(StorageObjectInfo),
    /// PUT stored the request body
    Stored(PutResult),
    /// DELETE ran; `true` when something was removed
    Deleted(bool),
}

/// Disk-backed storage for development and offline testing
#[derive(Debug)]
pub struct LocalStorageProvider {
    root: Utf8PathBuf,
    crypto: CryptoHandle,
    signer: UrlSigner,
}

impl LocalStorageProvider {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        let provider = Self {
            root: config.effective_local_path(),
            crypto: CryptoHandle::from_config(config)?,
            signer: UrlSigner::from_config(config)?,
        };
        info!("Local storage rooted at {}", provider.root);
        Ok(provider)
    }

    /// Build from parts, for callers that manage keys themselves
    pub fn with_parts(root: impl Into<Utf8PathBuf>, crypto: CryptoHandle, signer: UrlSigner) -> Self {
        Self {
            root: root.into(),
            crypto,
            signer,
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Filesystem path for `key`, always inside the root
    pub fn resolve_path(&self, key: &str) -> Result<Utf8PathBuf> {
        Ok(self.root.join(sanitize_key(key)?))
    }

    /// Check a signed URL's parameters against the current time
    pub fn verify_signed_url(
        &self,
        key: &str,
        method: HttpMethod,
        expires_at_ms: i64,
        signature: &str,
    ) -> bool {
        match self.signer.verify(key, method, expires_at_ms, signature) {
            Ok(()) => true,
            Err(e) => {
                debug!("Rejected signed URL for {}: {}", key, e);
                false
            }
        }
    }

    /// Verify a proxy request and perform the operation it authorizes
    ///
    /// GET returns the stored bytes; decrypting them is the caller's choice.
    pub async fn serve_signed_request(
        &self,
        request: &SignedUrlRequest,
        body: Option<Bytes>,
    ) -> Result<SignedResponse> {
        self.signer.verify(
            &request.key,
            request.method,
            request.expires_at_ms,
            &request.signature,
        )?;

        match request.method {
            HttpMethod::Get => Ok(match self.get(&request.key, GetOptions::default()).await? {
                Some(data) => SignedResponse::Content(data),
                None => SignedResponse::NotFound,
            }),
            HttpMethod::Head => Ok(match self.get_info(&request.key).await? {
                Some(info) => SignedResponse::Found(info),
                None => SignedResponse::NotFound,
            }),
            HttpMethod::Put => {
                let body = body.ok_or_else(|| {
                    StorageError::signed_url_invalid("PUT request has no body")
                })?;
                let result = self.put(&request.key, body, PutOptions::default()).await?;
                Ok(SignedResponse::Stored(result))
            }
            HttpMethod::Delete => Ok(SignedResponse::Deleted(self.delete(&request.key).await?)),
        }
    }

    async fn read_meta(&self, path: &Utf8Path) -> Option<ObjectMeta> {
        let meta_path = meta_path(path);
        let raw = match fs::read(&meta_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read {}: {}", meta_path, e);
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!("Ignoring malformed {}: {}", meta_path, e);
                None
            }
        }
    }
}

#[async_trait]
impl StorageProvider for LocalStorageProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(&self, key: &str, data: Bytes, opts: PutOptions) -> Result<PutResult> {
        let key = sanitize_key(key)?;
        let path = self.root.join(&key);

        let stored = self.crypto.seal(data, opts.encrypt)?;
        let hash = dataroom_crypto::hash(&stored);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &stored).await?;

        let meta_path = meta_path(&path);
        if opts.content_type.is_some() || opts.metadata.is_some() {
            let meta = ObjectMeta {
                content_type: opts.content_type,
                metadata: opts.metadata,
                created_at: Utc::now(),
            };
            fs::write(&meta_path, serde_json::to_vec_pretty(&meta)?).await?;
        } else {
            remove_if_present(&meta_path).await?;
        }

        debug!(
            "Stored {} bytes at {} (encrypted: {})",
            stored.len(),
            key,
            opts.encrypt
        );
        Ok(PutResult { key, hash })
    }

    async fn get(&self, key: &str, opts: GetOptions) -> Result<Option<Bytes>> {
        let path = self.resolve_path(key)?;
        let data = match fs::read(&path).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(self.crypto.open(data, opts.decrypt)?))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.resolve_path(key)?;
        let removed = remove_if_present(&path).await?;
        remove_if_present(&meta_path(&path)).await?;
        if removed {
            debug!("Deleted {}", path);
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, opts: ListOptions) -> Result<ListResult> {
        let root = self.root.clone();
        let prefix = normalize_prefix(opts.prefix.as_deref().unwrap_or(""));

        let keys = tokio::task::spawn_blocking(move || walk_keys(&root, &prefix))
            .await
            .map_err(std::io::Error::other)??;

        Ok(ListResult::page(keys, &opts))
    }

    async fn get_info(&self, key: &str) -> Result<Option<StorageObjectInfo>> {
        let key = sanitize_key(key)?;
        let path = self.root.join(&key);
        let stat = match fs::metadata(&path).await {
            Ok(stat) if stat.is_file() => stat,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let last_modified = stat
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let meta = self.read_meta(&path).await;

        Ok(Some(StorageObjectInfo {
            key,
            size: stat.len(),
            last_modified,
            content_type: meta.as_ref().and_then(|m| m.content_type.clone()),
            metadata: meta.and_then(|m| m.metadata),
        }))
    }

    async fn get_signed_url(&self, key: &str, opts: SignedUrlOptions) -> Result<String> {
        let key = sanitize_key(key)?;
        let expires_in_ms = i64::try_from(opts.expires_in.saturating_mul(1000)).unwrap_or(i64::MAX);
        let expires_at_ms = now_ms().saturating_add(expires_in_ms);
        self.signer.signed_url(&key, opts.method, expires_at_ms)
    }

    async fn copy(&self, source: &str, dest: &str) -> Result<()> {
        let source_path = self.resolve_path(source)?;
        let dest_path = self.resolve_path(dest)?;

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::copy(&source_path, &dest_path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::SourceNotFound {
                    key: source.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }

        let source_meta = meta_path(&source_path);
        let dest_meta = meta_path(&dest_path);
        match fs::copy(&source_meta, &dest_meta).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                remove_if_present(&dest_meta).await?;
            }
            Err(e) => return Err(e.into()),
        }

        debug!("Copied {} to {}", source_path, dest_path);
        Ok(())
    }
}

/// Normalize a key to a root-relative, forward-slash path
///
/// Backslashes become slashes; empty, `.` and `..` segments are dropped, so
/// `../../etc/passwd` becomes `etc/passwd`. Keys that reduce to nothing, or
/// that would collide with a metadata file, are rejected.
pub fn sanitize_key(key: &str) -> Result<String> {
    let normalized = key.replace('\\', "/");
    let clean = normalized
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("/");

    if clean.is_empty() {
        return Err(StorageError::invalid_key(key, "key has no usable path segments"));
    }
    if clean.ends_with(META_SUFFIX) {
        return Err(StorageError::invalid_key(
            key,
            format!("keys ending in {} are reserved", META_SUFFIX),
        ));
    }
    Ok(clean)
}

/// Prefix with the same separator rules as keys, keeping a trailing slash
fn normalize_prefix(prefix: &str) -> String {
    let normalized = prefix.replace('\\', "/");
    let trailing = normalized.ends_with('/');
    let mut clean = normalized
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("/");
    if trailing && !clean.is_empty() {
        clean.push('/');
    }
    clean
}

fn meta_path(path: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{}{}", path, META_SUFFIX))
}

/// Remove a file, reporting whether it existed
async fn remove_if_present(path: &Utf8Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Sorted keys under `root` starting with `prefix`, metadata files excluded
fn walk_keys(root: &Utf8Path, prefix: &str) -> std::io::Result<Vec<String>> {
    // Only the directory part of the prefix narrows the walk
    let start = match prefix.rfind('/') {
        Some(idx) => root.join(&prefix[..idx]),
        None => root.to_owned(),
    };
    if !start.is_dir() {
        return Ok(Vec::new());
    }

    let mut keys = Vec::new();
    for entry in WalkDir::new(&start) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) => continue,
            Err(e) => return Err(e.into()),
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if key.ends_with(META_SUFFIX) || !key.starts_with(prefix) {
            continue;
        }
        keys.push(key);
    }

    keys.sort();
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("/docs/a.pdf").unwrap(), "docs/a.pdf");
        assert_eq!(sanitize_key("../../etc/passwd").unwrap(), "etc/passwd");
        assert_eq!(sanitize_key("a/./b/../c").unwrap(), "a/b/c");
        assert_eq!(sanitize_key("a\\..\\b").unwrap(), "a/b");
        assert_eq!(sanitize_key("a//b///c").unwrap(), "a/b/c");
    }

    #[test]
    fn test_sanitize_rejects_empty_and_reserved() {
        assert!(sanitize_key("").is_err());
        assert!(sanitize_key("../..").is_err());
        assert!(sanitize_key("/").is_err());
        assert!(sanitize_key("docs/a.pdf.meta.json").is_err());
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("investors/inv-1/"), "investors/inv-1/");
        assert_eq!(normalize_prefix("/investors/inv-1"), "investors/inv-1");
        assert_eq!(normalize_prefix("../investors/"), "investors/");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    fn test_meta_path() {
        assert_eq!(
            meta_path(Utf8Path::new("/data/docs/a.pdf")),
            Utf8PathBuf::from("/data/docs/a.pdf.meta.json")
        );
    }
}
