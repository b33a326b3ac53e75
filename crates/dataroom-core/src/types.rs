//! Option, result and object description types shared by every provider

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::StorageError;

/// Boxed stream of object bytes
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Default signed URL lifetime in seconds
pub const DEFAULT_SIGNED_URL_EXPIRY_SECS: u64 = 3600;

/// HTTP verb a signed URL authorizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Put,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            other => Err(StorageError::signed_url_invalid(format!(
                "unsupported method '{}'",
                other
            ))),
        }
    }
}

/// Options for `put` and `put_stream`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    /// Encrypt with the envelope crypto service before writing
    pub encrypt: bool,
}

impl PutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encrypted() -> Self {
        Self {
            encrypt: true,
            ..Self::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Result of a successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutResult {
    pub key: String,
    /// SHA-256 (hex) of the bytes physically stored
    pub hash: String,
}

/// Options for `get` and `get_stream`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub decrypt: bool,
}

impl GetOptions {
    pub fn decrypted() -> Self {
        Self { decrypt: true }
    }
}

/// Options for `list`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub max_keys: Option<usize>,
    pub continuation_token: Option<String>,
}

impl ListOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    pub fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    /// Page size limit; `Some(0)` means no limit
    pub fn page_size(&self) -> Option<usize> {
        self.max_keys.filter(|max| *max > 0)
    }
}

/// One page of keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult {
    pub keys: Vec<String>,
    pub is_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_continuation_token: Option<String>,
}

impl ListResult {
    /// Page through a full key listing
    ///
    /// Keys are sorted; the page starts after `continuation_token` and the
    /// next token is the last key returned.
    pub fn page(mut keys: Vec<String>, opts: &ListOptions) -> Self {
        keys.sort();
        keys.dedup();
        if let Some(token) = opts.continuation_token.as_deref() {
            keys.retain(|k| k.as_str() > token);
        }

        let mut result = ListResult::default();
        if let Some(max) = opts.page_size() {
            if keys.len() > max {
                keys.truncate(max);
                result.is_truncated = true;
                result.next_continuation_token = keys.last().cloned();
            }
        }
        result.keys = keys;
        result
    }
}

/// Object description returned by `get_info`; never cached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

/// Options for `get_signed_url`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrlOptions {
    /// Lifetime in seconds
    pub expires_in: u64,
    pub method: HttpMethod,
    pub content_type: Option<String>,
}

impl Default for SignedUrlOptions {
    fn default() -> Self {
        Self {
            expires_in: DEFAULT_SIGNED_URL_EXPIRY_SECS,
            method: HttpMethod::Get,
            content_type: None,
        }
    }
}

impl SignedUrlOptions {
    pub fn for_method(method: HttpMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn expires_in(mut self, secs: u64) -> Self {
        self.expires_in = secs;
        self
    }
}
