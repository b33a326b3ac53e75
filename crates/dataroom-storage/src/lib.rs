//! Storage providers for dataroom documents
//!
//! This crate provides one object storage contract with three backends:
//!
//! - Local filesystem (development, HMAC-signed proxy URLs)
//! - Managed object storage through a signing sidecar
//! - S3-compatible buckets (AWS S3, R2, MinIO) with native presigning
//!
//! Callers obtain a provider through [`storage`] or a [`StorageFactory`] and
//! never name a concrete backend.

pub mod crypto;
pub mod documents;
pub mod factory;
pub mod local;
pub mod s3;
pub mod sidecar;
pub mod signed_url;
pub mod traits;

pub use crypto::CryptoHandle;
pub use documents::{DocumentStore, DocumentType, StoredDocument};
pub use factory::{create_provider, reset_storage, storage, storage_factory, StorageFactory};
pub use local::LocalStorageProvider;
pub use s3::S3StorageProvider;
pub use sidecar::SidecarStorageProvider;
pub use signed_url::{SignedUrlRequest, UrlSigner};
pub use traits::StorageProvider;
