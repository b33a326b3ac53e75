//! # dataroom-core
//!
//! Shared foundation for dataroom storage providers:
//! - [`StorageConfig`] loading from defaults, `dataroom.yaml` and the environment
//! - [`StorageError`] taxonomy separating not-found, integrity, malformed-input,
//!   transport and configuration failures
//! - Option and result types for the provider contract

pub mod config;
pub mod error;
pub mod types;

pub use config::{ProviderKind, StorageConfig};
pub use error::{Result, StorageError};
pub use types::{
    ByteStream, GetOptions, HttpMethod, ListOptions, ListResult, PutOptions, PutResult,
    SignedUrlOptions, StorageObjectInfo,
};
