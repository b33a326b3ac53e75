//! HMAC-signed URLs for the local provider
//!
//! A local disk has no presigning, so URLs point at a proxy route:
//!
//! ```text
//! <base>/api/storage/local?key=<key>&method=<METHOD>&expires=<epochMs>&sig=<hex>
//! ```
//!
//! where `sig = HMAC-SHA256(secret, "<key>:<METHOD>:<expires>")`. A request is
//! honoured only while `now <= expires`, and expiry is checked before the
//! signature is looked at.

use chrono::Utc;
use dataroom_core::{HttpMethod, Result, StorageConfig, StorageError};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::sync::OnceLock;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Proxy route signed URLs point at
pub const LOCAL_PROXY_PATH: &str = "/api/storage/local";

/// Per-process secret used when no encryption key is configured
static FALLBACK_SECRET: OnceLock<[u8; 32]> = OnceLock::new();

fn fallback_secret() -> &'static [u8; 32] {
    FALLBACK_SECRET.get_or_init(|| {
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        secret
    })
}

/// Issues and verifies signed local URLs
#[derive(Clone)]
pub struct UrlSigner {
    keyed: HmacSha256,
    base_url: String,
}

impl UrlSigner {
    pub fn new(secret: &[u8], base_url: impl Into<String>) -> Result<Self> {
        let keyed = HmacSha256::new_from_slice(secret)
            .map_err(|e| StorageError::invalid_config(format!("unusable signing secret: {}", e)))?;
        Ok(Self {
            keyed,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Sign with the configured encryption key, or a per-process secret
    ///
    /// URLs signed with the fallback secret stop verifying after a restart.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let base_url = config.effective_public_base_url();
        match config.encryption_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => Self::new(key.as_bytes(), base_url),
            None => Self::new(fallback_secret(), base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Hex HMAC over `key:METHOD:expires`
    pub fn sign(&self, key: &str, method: HttpMethod, expires_at_ms: i64) -> String {
        hex::encode(self.mac(key, method, expires_at_ms).finalize().into_bytes())
    }

    /// Full proxy URL for `key`
    pub fn signed_url(&self, key: &str, method: HttpMethod, expires_at_ms: i64) -> Result<String> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, LOCAL_PROXY_PATH))
            .map_err(|e| StorageError::invalid_config(format!("invalid public base URL: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("key", key)
            .append_pair("method", method.as_str())
            .append_pair("expires", &expires_at_ms.to_string())
            .append_pair("sig", &self.sign(key, method, expires_at_ms));
        Ok(url.into())
    }

    /// Verify against the current wall clock
    pub fn verify(
        &self,
        key: &str,
        method: HttpMethod,
        expires_at_ms: i64,
        signature: &str,
    ) -> Result<()> {
        self.verify_at(key, method, expires_at_ms, signature, now_ms())
    }

    /// Verify against an explicit clock reading
    pub fn verify_at(
        &self,
        key: &str,
        method: HttpMethod,
        expires_at_ms: i64,
        signature: &str,
        now_ms: i64,
    ) -> Result<()> {
        if now_ms > expires_at_ms {
            return Err(StorageError::SignedUrlExpired);
        }

        let provided = hex::decode(signature)
            .map_err(|_| StorageError::signed_url_invalid("signature is not hex"))?;
        self.mac(key, method, expires_at_ms)
            .verify_slice(&provided)
            .map_err(|_| StorageError::signed_url_invalid("signature mismatch"))
    }

    fn mac(&self, key: &str, method: HttpMethod, expires_at_ms: i64) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(format!("{}:{}:{}", key, method.as_str(), expires_at_ms).as_bytes());
        mac
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Parameters of an incoming proxy request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrlRequest {
    pub key: String,
    pub method: HttpMethod,
    pub expires_at_ms: i64,
    pub signature: String,
}

impl SignedUrlRequest {
    /// Parse from a full signed URL
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)
            .map_err(|e| StorageError::signed_url_invalid(format!("malformed URL: {}", e)))?;
        Self::from_pairs(parsed.query_pairs())
    }

    /// Parse from a raw query string (without the leading `?`)
    pub fn from_query(query: &str) -> Result<Self> {
        Self::from_pairs(url::form_urlencoded::parse(
            query.trim_start_matches('?').as_bytes(),
        ))
    }

    fn from_pairs<'a>(
        pairs: impl Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
    ) -> Result<Self> {
        let mut key = None;
        let mut method = None;
        let mut expires = None;
        let mut signature = None;

        for (name, value) in pairs {
            match name.as_ref() {
                "key" => key = Some(value.into_owned()),
                "method" => method = Some(value.into_owned()),
                "expires" => expires = Some(value.into_owned()),
                "sig" => signature = Some(value.into_owned()),
                _ => {}
            }
        }

        let missing = |field: &str| StorageError::signed_url_invalid(format!("missing {}", field));
        let method: HttpMethod = method.ok_or_else(|| missing("method"))?.parse()?;
        let expires_at_ms = expires
            .ok_or_else(|| missing("expires"))?
            .parse::<i64>()
            .map_err(|_| StorageError::signed_url_invalid("expires is not a timestamp"))?;

        Ok(Self {
            key: key.ok_or_else(|| missing("key"))?,
            method,
            expires_at_ms,
            signature: signature.ok_or_else(|| missing("sig"))?,
        })
    }
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
