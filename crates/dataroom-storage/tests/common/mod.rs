//! Common test infrastructure for dataroom-storage tests
//!
//! - `constants`: keys and payloads shared across tests
//! - `fixtures`: provider builders over temp directories
//! - `sidecar_mock`: wiremock fake of the signing sidecar and object store
//! - `s3_mock`: wiremock fake of a path-style S3 endpoint

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod constants;
pub mod fixtures;
pub mod s3_mock;
pub mod sidecar_mock;

pub use constants::*;
pub use fixtures::*;
pub use s3_mock::*;
pub use sidecar_mock::*;
