//! Investor document naming and integrity helpers
//!
//! Documents are stored encrypted under
//! `investors/{investorId}/documents/{docType}/{name}-{timestampMs}-{nonce}{.ext}`.
//! The SHA-256 of the plaintext is recorded at upload and checked on every
//! download.

use crate::traits::StorageProvider;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dataroom_core::{
    GetOptions, ListOptions, PutOptions, Result, SignedUrlOptions, StorageError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Kind of investor document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    Nda,
    SubscriptionAgreement,
    K1,
    TaxForm,
    CapitalCall,
    DistributionNotice,
    Kyc,
    Other,
    /// Any other category, used verbatim after sanitizing
    Custom(String),
}

impl DocumentType {
    pub fn as_str(&self) -> &str {
        match self {
            DocumentType::Nda => "NDA",
            DocumentType::SubscriptionAgreement => "SUBSCRIPTION_AGREEMENT",
            DocumentType::K1 => "K1",
            DocumentType::TaxForm => "TAX_FORM",
            DocumentType::CapitalCall => "CAPITAL_CALL",
            DocumentType::DistributionNotice => "DISTRIBUTION_NOTICE",
            DocumentType::Kyc => "KYC",
            DocumentType::Other => "OTHER",
            DocumentType::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "NDA" => DocumentType::Nda,
            "SUBSCRIPTION_AGREEMENT" => DocumentType::SubscriptionAgreement,
            "K1" | "K-1" => DocumentType::K1,
            "TAX_FORM" => DocumentType::TaxForm,
            "CAPITAL_CALL" => DocumentType::CapitalCall,
            "DISTRIBUTION_NOTICE" => DocumentType::DistributionNotice,
            "KYC" => DocumentType::Kyc,
            "OTHER" => DocumentType::Other,
            _ => DocumentType::Custom(s.to_string()),
        })
    }
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_`
///
/// Leading dots are dropped so a name can never be `.` or `..`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Prefix holding every document of one investor
pub fn investor_documents_prefix(investor_id: &str) -> String {
    format!("investors/{}/documents/", sanitize_filename(investor_id))
}

/// Deterministic document key for a given upload time and nonce
pub fn document_key(
    investor_id: &str,
    doc_type: &DocumentType,
    filename: &str,
    timestamp_ms: i64,
    nonce: &str,
) -> String {
    let safe = sanitize_filename(filename);
    let name = match safe.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{}-{}-{}.{}", stem, timestamp_ms, nonce, ext)
        }
        _ => format!("{}-{}-{}", safe, timestamp_ms, nonce),
    };
    format!(
        "{}{}/{}",
        investor_documents_prefix(investor_id),
        sanitize_filename(doc_type.as_str()),
        name
    )
}

/// Document key stamped with the current time and a random nonce
///
/// The nonce keeps two uploads of one filename within the same
/// millisecond apart.
pub fn new_document_key(investor_id: &str, doc_type: &DocumentType, filename: &str) -> String {
    document_key(
        investor_id,
        doc_type,
        filename,
        Utc::now().timestamp_millis(),
        &format!("{:08x}", rand::random::<u32>()),
    )
}

/// Key for a signature image
pub fn signature_key(investor_id: &str, filename: &str) -> String {
    format!(
        "investors/{}/signatures/{}",
        sanitize_filename(investor_id),
        sanitize_filename(filename)
    )
}

/// Whether `data` still hashes to the value recorded at upload
pub fn verify_document_integrity(data: &[u8], expected_hash: &str) -> bool {
    dataroom_crypto::verify_hash(data, expected_hash)
}

/// Record of an uploaded document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub key: String,
    /// SHA-256 (hex) of the plaintext
    pub hash: String,
    pub size: u64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Document operations over any provider
#[derive(Clone)]
pub struct DocumentStore {
    provider: Arc<dyn StorageProvider>,
}

impl DocumentStore {
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn StorageProvider> {
        &self.provider
    }

    /// Encrypt and store a document
    pub async fn upload(
        &self,
        investor_id: &str,
        doc_type: &DocumentType,
        filename: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Result<StoredDocument> {
        let key = new_document_key(investor_id, doc_type, filename);
        let content_type = content_type.unwrap_or("application/pdf").to_string();
        let opts = PutOptions::encrypted()
            .with_content_type(content_type.clone())
            .with_metadata("investorId", investor_id)
            .with_metadata("documentType", doc_type.as_str())
            .with_metadata("originalFilename", filename);
        self.store(key, data, content_type, opts).await
    }

    /// Encrypt and store a signature image
    pub async fn upload_signature(
        &self,
        investor_id: &str,
        filename: &str,
        data: Bytes,
    ) -> Result<StoredDocument> {
        let key = signature_key(investor_id, filename);
        let content_type = "image/png".to_string();
        let opts = PutOptions::encrypted()
            .with_content_type(content_type.clone())
            .with_metadata("investorId", investor_id);
        self.store(key, data, content_type, opts).await
    }

    /// Decrypt a document, checking it against `expected_hash` when given
    pub async fn download(&self, key: &str, expected_hash: Option<&str>) -> Result<Option<Bytes>> {
        let Some(data) = self.provider.get(key, GetOptions::decrypted()).await? else {
            return Ok(None);
        };

        if let Some(expected) = expected_hash {
            if !verify_document_integrity(&data, expected) {
                let actual = dataroom_crypto::hash(&data);
                warn!("Integrity check failed for {}", key);
                return Err(StorageError::IntegrityMismatch {
                    key: key.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        Ok(Some(data))
    }

    /// Every document key of an investor, optionally of one type
    pub async fn list(
        &self,
        investor_id: &str,
        doc_type: Option<&DocumentType>,
    ) -> Result<Vec<String>> {
        let mut prefix = investor_documents_prefix(investor_id);
        if let Some(doc_type) = doc_type {
            prefix.push_str(&sanitize_filename(doc_type.as_str()));
            prefix.push('/');
        }

        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;
        loop {
            let page = self
                .provider
                .list(ListOptions {
                    prefix: Some(prefix.clone()),
                    max_keys: None,
                    continuation_token,
                })
                .await?;
            keys.extend(page.keys);

            match page.next_continuation_token {
                Some(token) if page.is_truncated => continuation_token = Some(token),
                _ => break,
            }
        }
        Ok(keys)
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.provider.delete(key).await
    }

    /// Download link valid for `expires_in` seconds
    pub async fn signed_url(&self, key: &str, expires_in: u64) -> Result<String> {
        self.provider
            .get_signed_url(key, SignedUrlOptions::default().expires_in(expires_in))
            .await
    }

    async fn store(
        &self,
        key: String,
        data: Bytes,
        content_type: String,
        opts: PutOptions,
    ) -> Result<StoredDocument> {
        let hash = dataroom_crypto::hash(&data);
        let size = data.len() as u64;
        let opts = opts.with_metadata("sha256", hash.clone());

        let result = self.provider.put(&key, data, opts).await?;
        debug!("Stored document {} ({} bytes)", result.key, size);

        Ok(StoredDocument {
            key: result.key,
            hash,
            size,
            content_type,
            uploaded_at: Utc::now(),
        })
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("provider", &self.provider.name())
            .finish()
    }
}
