//! Shared fixtures for dataroom-core integration tests

#![allow(dead_code)]

use camino::Utf8PathBuf;
use std::collections::HashMap;
use tempfile::TempDir;

/// Write `content` as `dataroom.yaml` in a fresh temp dir
pub fn write_config(content: &str) -> (TempDir, Utf8PathBuf) {
    let dir = TempDir::new().expect("create temp dir");
    let path = Utf8PathBuf::try_from(dir.path().join("dataroom.yaml")).expect("utf-8 temp path");
    std::fs::write(&path, content).expect("write config");
    (dir, path)
}

/// Environment lookup backed by a fixed set of variables
pub fn env_lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name: &str| map.get(name).cloned()
}

pub const S3_YAML: &str = r#"
storage:
  provider: s3
  bucket: fund-documents
  region: eu-central-1
  endpoint: https://minio.internal:9000
"#;
