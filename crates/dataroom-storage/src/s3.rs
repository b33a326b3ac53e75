//! S3-compatible provider
//!
//! Works against AWS S3 and S3-protocol services (R2, MinIO, Wasabi) using
//! native object operations and the SDK's presigning instead of a custom
//! HMAC scheme.

use crate::crypto::CryptoHandle;
use crate::traits::StorageProvider;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{
    Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation,
};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream as SdkByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dataroom_core::{
    ByteStream, GetOptions, HttpMethod, ListOptions, ListResult, ProviderKind, PutOptions,
    PutResult, Result, SignedUrlOptions, StorageConfig, StorageError, StorageObjectInfo,
};
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::time::Duration;
use tracing::{debug, info};

/// Bytes left as-is in `x-amz-copy-source` keys
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// S3-protocol storage backend
pub struct S3StorageProvider {
    client: Client,
    bucket: String,
    kind: ProviderKind,
    crypto: CryptoHandle,
}

impl S3StorageProvider {
    /// Create a provider from configuration
    ///
    /// Explicit credentials take precedence over the default AWS chain. A
    /// custom endpoint switches to path-style addressing and only sends or
    /// checks payload checksums when an operation requires them.
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        config.validate()?;
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| StorageError::not_configured(config.provider.as_str(), "bucket"))?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.effective_region().to_string()));
        if let (Some(id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                id.clone(),
                secret.clone(),
                None,
                None,
                "dataroom-config",
            ));
        }
        let sdk_config = loader.load().await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = config.endpoint.as_deref() {
            debug!("Using custom S3 endpoint: {}", endpoint_url);
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint_url)
                .force_path_style(true)
                .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
                .response_checksum_validation(ResponseChecksumValidation::WhenRequired);
        }
        let client = Client::from_conf(s3_config_builder.build());

        info!(
            "{} storage for bucket {} in {}",
            config.provider,
            bucket,
            config.effective_region()
        );
        Ok(Self {
            client,
            bucket,
            kind: config.provider,
            crypto: CryptoHandle::from_config(config)?,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_error<E>(&self, operation: &str, err: SdkError<E>) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StorageError::backend(
            self.kind.as_str(),
            operation,
            DisplayErrorContext(&err).to_string(),
        )
    }

    async fn presign(&self, key: &str, opts: &SignedUrlOptions) -> Result<String> {
        let presigning = PresigningConfig::expires_in(Duration::from_secs(opts.expires_in))
            .map_err(|e| StorageError::invalid_config(format!("invalid expiry: {}", e)))?;
        let key = normalize_key(key);

        let request = match opts.method {
            HttpMethod::Get => self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(presigning)
                .await
                .map_err(|e| self.backend_error("PresignGetObject", e))?,
            HttpMethod::Put => self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .set_content_type(opts.content_type.clone())
                .presigned(presigning)
                .await
                .map_err(|e| self.backend_error("PresignPutObject", e))?,
            HttpMethod::Delete => self
                .client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(presigning)
                .await
                .map_err(|e| self.backend_error("PresignDeleteObject", e))?,
            HttpMethod::Head => self
                .client
                .head_object()
                .bucket(&self.bucket)
                .key(key)
                .presigned(presigning)
                .await
                .map_err(|e| self.backend_error("PresignHeadObject", e))?,
        };

        Ok(request.uri().to_string())
    }
}

impl std::fmt::Debug for S3StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3StorageProvider")
            .field("bucket", &self.bucket)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Missing object, by error code or HTTP status
fn is_not_found<E: ProvideErrorMetadata>(err: &SdkError<E>) -> bool {
    if matches!(err.code(), Some("NoSuchKey") | Some("NotFound")) {
        return true;
    }
    err.raw_response()
        .map(|response| response.status().as_u16() == 404)
        .unwrap_or(false)
}

/// Object keys never start with a slash
fn normalize_key(key: &str) -> &str {
    key.trim_start_matches('/')
}

/// `bucket/key` with the key percent-encoded for `x-amz-copy-source`
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, utf8_percent_encode(key, COPY_SOURCE))
}

fn to_chrono(value: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

#[async_trait]
impl StorageProvider for S3StorageProvider {
    fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    async fn put(&self, key: &str, data: Bytes, opts: PutOptions) -> Result<PutResult> {
        let key = normalize_key(key);
        let stored = self.crypto.seal(data, opts.encrypt)?;
        let hash = dataroom_crypto::hash(&stored);
        let size = stored.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(SdkByteStream::from(stored))
            .set_content_type(opts.content_type)
            .set_metadata(opts.metadata)
            .send()
            .await
            .map_err(|e| self.backend_error("PutObject", e))?;

        debug!("Uploaded {} bytes to s3://{}/{}", size, self.bucket, key);
        Ok(PutResult {
            key: key.to_string(),
            hash,
        })
    }

    async fn get(&self, key: &str, opts: GetOptions) -> Result<Option<Bytes>> {
        let key = normalize_key(key);
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(self.backend_error("GetObject", e)),
        };

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::backend(self.kind.as_str(), "GetObject", e.to_string()))?;
        let data = body.into_bytes();
        debug!(
            "Downloaded {} bytes from s3://{}/{}",
            data.len(),
            self.bucket,
            key
        );

        Ok(Some(self.crypto.open(data, opts.decrypt)?))
    }

    async fn get_stream(&self, key: &str, opts: GetOptions) -> Result<Option<ByteStream>> {
        if opts.decrypt {
            let data = self.get(key, opts).await?;
            return Ok(data.map(|bytes| futures::stream::once(async move { Ok(bytes) }).boxed()));
        }

        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(normalize_key(key))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(self.backend_error("GetObject", e)),
        };

        let stream = futures::stream::unfold(response.body, |mut body| async move {
            match body.next().await {
                Some(Ok(chunk)) => Some((Ok(chunk), body)),
                Some(Err(e)) => Some((Err(std::io::Error::other(e)), body)),
                None => None,
            }
        });
        Ok(Some(stream.boxed()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        // DeleteObject succeeds for missing keys, so ask first
        let existed = self.exists(key).await?;
        if !existed {
            return Ok(false);
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(normalize_key(key))
            .send()
            .await
            .map_err(|e| self.backend_error("DeleteObject", e))?;

        debug!("Deleted s3://{}/{}", self.bucket, normalize_key(key));
        Ok(true)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get_info(key).await?.is_some())
    }

    async fn list(&self, opts: ListOptions) -> Result<ListResult> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(opts.prefix.as_deref().map(|p| normalize_key(p).to_string()))
            .set_max_keys(
                opts.page_size()
                    .map(|max| i32::try_from(max).unwrap_or(i32::MAX)),
            )
            .set_continuation_token(opts.continuation_token)
            .send()
            .await
            .map_err(|e| self.backend_error("ListObjectsV2", e))?;

        let keys = response
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect::<Vec<_>>();
        debug!("Listed {} keys in s3://{}", keys.len(), self.bucket);

        Ok(ListResult {
            keys,
            is_truncated: response.is_truncated().unwrap_or(false),
            next_continuation_token: response.next_continuation_token().map(str::to_string),
        })
    }

    async fn get_info(&self, key: &str) -> Result<Option<StorageObjectInfo>> {
        let key = normalize_key(key);
        let response = match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(self.backend_error("HeadObject", e)),
        };

        Ok(Some(StorageObjectInfo {
            key: key.to_string(),
            size: response
                .content_length()
                .and_then(|len| u64::try_from(len).ok())
                .unwrap_or(0),
            last_modified: response
                .last_modified()
                .and_then(to_chrono)
                .unwrap_or_else(Utc::now),
            content_type: response.content_type().map(str::to_string),
            metadata: response.metadata().cloned(),
        }))
    }

    async fn get_signed_url(&self, key: &str, opts: SignedUrlOptions) -> Result<String> {
        self.presign(key, &opts).await
    }

    async fn copy(&self, source: &str, dest: &str) -> Result<()> {
        let source_key = normalize_key(source);
        let dest_key = normalize_key(dest);

        match self
            .client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source(&self.bucket, source_key))
            .key(dest_key)
            .send()
            .await
        {
            Ok(_) => {
                debug!(
                    "Copied s3://{}/{} to {}",
                    self.bucket, source_key, dest_key
                );
                Ok(())
            }
            Err(e) if is_not_found(&e) => Err(StorageError::SourceNotFound {
                key: source.to_string(),
            }),
            Err(e) => Err(self.backend_error("CopyObject", e)),
        }
    }
}
