//! Managed object storage through a signing sidecar
//!
//! The provider holds no bucket credentials. For every operation it asks a
//! trusted local sidecar to mint a short-lived signed URL for
//! `(bucket, object, method, expiry)` and then transfers against that URL.

use crate::crypto::CryptoHandle;
use crate::traits::StorageProvider;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use dataroom_core::{
    ByteStream, GetOptions, HttpMethod, ListOptions, ListResult, PutOptions, PutResult, Result,
    SignedUrlOptions, StorageConfig, StorageError, StorageObjectInfo,
};
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderName, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

/// Sidecar route that mints signed URLs
pub const SIGN_PATH: &str = "/object-storage/signed-object-url";

/// Signed URL lifetimes per operation, in seconds
pub const PUT_TTL_SECS: u64 = 900;
pub const GET_TTL_SECS: u64 = 3600;
pub const DELETE_TTL_SECS: u64 = 300;
pub const HEAD_TTL_SECS: u64 = 300;
pub const LIST_TTL_SECS: u64 = 300;

#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    bucket_name: &'a str,
    object_name: &'a str,
    method: HttpMethod,
    expires_at: String,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    signed_url: String,
}

/// One page of a bucket listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListingPage {
    #[serde(default)]
    items: Vec<ListingItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingItem {
    name: String,
}

/// Split `/bucket/object/with/slashes` into `(bucket, object)`
pub fn parse_object_path(path: &str) -> Result<(String, String)> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    match trimmed.split_once('/') {
        Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => {
            Ok((bucket.to_string(), object.to_string()))
        }
        _ => Err(StorageError::invalid_key(
            path,
            "object path must contain a bucket and an object name",
        )),
    }
}

/// Provider backed by a signing sidecar
#[derive(Debug)]
pub struct SidecarStorageProvider {
    client: Client,
    endpoint: String,
    bucket: String,
    crypto: CryptoHandle,
}

impl SidecarStorageProvider {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| StorageError::not_configured("sidecar", "bucket"))?;
        let endpoint = config
            .effective_sidecar_endpoint()
            .trim_end_matches('/')
            .to_string();

        info!("Sidecar storage for bucket {} via {}", bucket, endpoint);
        Ok(Self {
            client: Client::new(),
            endpoint,
            bucket,
            crypto: CryptoHandle::from_config(config)?,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Full `/bucket/object` path for a key
    ///
    /// Keys that already start with `/` are taken as full paths.
    pub fn object_path(&self, key: &str) -> String {
        if key.starts_with('/') {
            key.to_string()
        } else {
            format!("/{}/{}", self.bucket, key)
        }
    }

    /// Ask the sidecar for a URL authorizing `method` on `key`
    pub async fn sign(&self, key: &str, method: HttpMethod, ttl_secs: u64) -> Result<String> {
        let (bucket_name, object_name) = parse_object_path(&self.object_path(key))?;
        self.request_signature(&bucket_name, &object_name, method, ttl_secs)
            .await
    }

    /// Ask the sidecar for a bucket-level GET URL that lists objects
    pub async fn sign_listing(&self) -> Result<String> {
        self.request_signature(&self.bucket, "", HttpMethod::Get, LIST_TTL_SECS)
            .await
    }

    async fn request_signature(
        &self,
        bucket_name: &str,
        object_name: &str,
        method: HttpMethod,
        ttl_secs: u64,
    ) -> Result<String> {
        let expires_at = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| {
                StorageError::invalid_config(format!("signed URL lifetime {}s is out of range", ttl_secs))
            })?;
        let request = SignRequest {
            bucket_name,
            object_name,
            method,
            expires_at: expires_at.to_rfc3339(),
        };

        let url = format!("{}{}", self.endpoint, SIGN_PATH);
        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::http(status.as_u16(), url, body));
        }

        let signed: SignResponse = response.json().await?;
        debug!("Signed {} for {}/{}", method, bucket_name, object_name);
        Ok(signed.signed_url)
    }

    async fn fetch(&self, key: &str) -> Result<Option<reqwest::Response>> {
        let url = self.sign(key, HttpMethod::Get, GET_TTL_SECS).await?;
        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response)),
            status => Err(failure(status, key, response).await),
        }
    }

    /// Every object name under `prefix`, following listing page tokens
    async fn list_all(&self, prefix: &str) -> Result<Vec<String>> {
        let signed = self.sign_listing().await?;
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = Url::parse(&signed).map_err(|e| {
                StorageError::backend("sidecar", "list", format!("sidecar returned a bad URL: {}", e))
            })?;
            {
                let mut query = url.query_pairs_mut();
                if !prefix.is_empty() {
                    query.append_pair("prefix", prefix);
                }
                if let Some(token) = page_token.as_deref() {
                    query.append_pair("pageToken", token);
                }
            }

            let response = self.client.get(url).send().await?;
            let page: ListingPage = match response.status() {
                StatusCode::NOT_FOUND => return Ok(names),
                status if status.is_success() => response.json().await?,
                status => return Err(failure(status, &self.bucket, response).await),
            };

            names.extend(page.items.into_iter().map(|item| item.name));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} objects under {}/{}", names.len(), self.bucket, prefix);
        Ok(names)
    }

    async fn head(&self, key: &str) -> Result<Option<reqwest::Response>> {
        let url = self.sign(key, HttpMethod::Head, HEAD_TTL_SECS).await?;
        let response = self.client.head(&url).send().await?;
        if response.status().is_success() {
            Ok(Some(response))
        } else {
            debug!("HEAD {} returned {}", key, response.status());
            Ok(None)
        }
    }
}

/// Non-success response as an error, without leaking the signed URL
async fn failure(status: StatusCode, key: &str, response: reqwest::Response) -> StorageError {
    let body = response.text().await.unwrap_or_default();
    StorageError::http(status.as_u16(), key, body)
}

#[async_trait]
impl StorageProvider for SidecarStorageProvider {
    fn name(&self) -> &'static str {
        "sidecar"
    }

    async fn put(&self, key: &str, data: Bytes, opts: PutOptions) -> Result<PutResult> {
        let stored = self.crypto.seal(data, opts.encrypt)?;
        let hash = dataroom_crypto::hash(&stored);
        let size = stored.len();

        let url = self.sign(key, HttpMethod::Put, PUT_TTL_SECS).await?;
        let content_type = opts
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, content_type)
            .body(stored)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(failure(status, key, response).await);
        }

        debug!("Uploaded {} bytes to {}", size, key);
        Ok(PutResult {
            key: key.to_string(),
            hash,
        })
    }

    async fn get(&self, key: &str, opts: GetOptions) -> Result<Option<Bytes>> {
        let Some(response) = self.fetch(key).await? else {
            return Ok(None);
        };
        let data = response.bytes().await?;
        Ok(Some(self.crypto.open(data, opts.decrypt)?))
    }

    async fn get_stream(&self, key: &str, opts: GetOptions) -> Result<Option<ByteStream>> {
        if opts.decrypt {
            // Decryption needs the whole blob
            let data = self.get(key, opts).await?;
            return Ok(data.map(|bytes| futures::stream::once(async move { Ok(bytes) }).boxed()));
        }

        let Some(response) = self.fetch(key).await? else {
            return Ok(None);
        };
        Ok(Some(
            response
                .bytes_stream()
                .map_err(std::io::Error::other)
                .boxed(),
        ))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let url = self.sign(key, HttpMethod::Delete, DELETE_TTL_SECS).await?;
        let response = self.client.delete(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(failure(status, key, response).await),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.head(key).await?.is_some())
    }

    async fn list(&self, opts: ListOptions) -> Result<ListResult> {
        let prefix = opts
            .prefix
            .as_deref()
            .map(|p| p.trim_start_matches('/'))
            .unwrap_or("");
        let mut names = self.list_all(prefix).await?;
        names.retain(|name| name.starts_with(prefix));
        Ok(ListResult::page(names, &opts))
    }

    async fn get_info(&self, key: &str) -> Result<Option<StorageObjectInfo>> {
        let Some(response) = self.head(key).await? else {
            return Ok(None);
        };
        let headers = response.headers();
        let header = |name: HeaderName| headers.get(name).and_then(|v| v.to_str().ok());

        let size = header(CONTENT_LENGTH)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let last_modified = header(LAST_MODIFIED)
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Ok(Some(StorageObjectInfo {
            key: key.to_string(),
            size,
            last_modified,
            content_type: header(CONTENT_TYPE).map(str::to_string),
            metadata: None,
        }))
    }

    async fn get_signed_url(&self, key: &str, opts: SignedUrlOptions) -> Result<String> {
        self.sign(key, opts.method, opts.expires_in).await
    }

    async fn copy(&self, source: &str, dest: &str) -> Result<()> {
        let data = self
            .get(source, GetOptions::default())
            .await?
            .ok_or_else(|| StorageError::SourceNotFound {
                key: source.to_string(),
            })?;
        self.put(dest, data, PutOptions::default()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> SidecarStorageProvider {
        let config = StorageConfig {
            provider: dataroom_core::ProviderKind::Sidecar,
            bucket: Some("replit-objstore-1".into()),
            ..StorageConfig::default()
        };
        SidecarStorageProvider::new(&config).unwrap()
    }

    #[test]
    fn test_parse_object_path() {
        assert_eq!(
            parse_object_path("/bucket/a/b/c.pdf").unwrap(),
            ("bucket".to_string(), "a/b/c.pdf".to_string())
        );
        assert_eq!(
            parse_object_path("bucket/x").unwrap(),
            ("bucket".to_string(), "x".to_string())
        );
        assert!(parse_object_path("/bucket").is_err());
        assert!(parse_object_path("/bucket/").is_err());
        assert!(parse_object_path("//x").is_err());
        assert!(parse_object_path("").is_err());
    }

    #[test]
    fn test_object_path_prefixes_bucket() {
        let p = provider();
        assert_eq!(p.object_path("docs/a.pdf"), "/replit-objstore-1/docs/a.pdf");
        assert_eq!(p.object_path("/other/docs/a.pdf"), "/other/docs/a.pdf");
    }

    #[test]
    fn test_requires_bucket() {
        let config = StorageConfig {
            provider: dataroom_core::ProviderKind::Sidecar,
            ..StorageConfig::default()
        };
        assert!(matches!(
            SidecarStorageProvider::new(&config),
            Err(StorageError::NotConfigured { .. })
        ));
    }

    #[test]
    fn test_sign_request_shape() {
        let request = SignRequest {
            bucket_name: "b",
            object_name: "o/p",
            method: HttpMethod::Put,
            expires_at: "2026-01-01T00:00:00+00:00".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["bucket_name"], "b");
        assert_eq!(json["object_name"], "o/p");
        assert_eq!(json["method"], "PUT");
        assert_eq!(json["expires_at"], "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_listing_page_shape() {
        let page: ListingPage = serde_json::from_str(
            r#"{"items":[{"name":"a.pdf","size":3},{"name":"b/c.pdf"}],"nextPageToken":"2"}"#,
        )
        .unwrap();
        let names: Vec<_> = page.items.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b/c.pdf"]);
        assert_eq!(page.next_page_token.as_deref(), Some("2"));

        let empty: ListingPage = serde_json::from_str("{}").unwrap();
        assert!(empty.items.is_empty());
        assert!(empty.next_page_token.is_none());
    }
}
