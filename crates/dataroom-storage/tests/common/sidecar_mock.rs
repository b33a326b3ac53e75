//! Wiremock fake of the signing sidecar
//!
//! The sign route answers with a URL on the same server under `/storage/`,
//! and an in-memory object store serves GET/PUT/DELETE/HEAD there. A GET on
//! `/storage/{bucket}/` lists the bucket in pages of [`LISTING_PAGE_SIZE`].

use super::constants::*;
use dataroom_core::{ProviderKind, StorageConfig};
use dataroom_storage::SidecarStorageProvider;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

type Objects = Arc<Mutex<HashMap<String, (Vec<u8>, String)>>>;

/// Names per listing page served by the fake
pub const LISTING_PAGE_SIZE: usize = 2;

/// Mints URLs of the form `{base}/storage/{bucket}/{object}`
struct SignResponder {
    base: String,
}

impl Respond for SignResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let bucket = body["bucket_name"].as_str().unwrap_or_default();
        let object = body["object_name"].as_str().unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "signed_url": format!("{}/storage/{}/{}", self.base, bucket, object),
        }))
    }
}

/// In-memory object store behind signed URLs
struct ObjectResponder {
    objects: Objects,
}

impl Respond for ObjectResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let key = request.url.path().trim_start_matches("/storage/").to_string();
        let mut objects = self.objects.lock().unwrap();
        match request.method.as_str() {
            "PUT" => {
                let content_type = request
                    .headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("application/octet-stream")
                    .to_string();
                objects.insert(key, (request.body.clone(), content_type));
                ResponseTemplate::new(200)
            }
            "GET" if key.ends_with('/') => listing(&objects, &key, request),
            "GET" | "HEAD" => match objects.get(&key) {
                Some((data, content_type)) => {
                    ResponseTemplate::new(200).set_body_raw(data.clone(), content_type)
                }
                None => ResponseTemplate::new(404),
            },
            "DELETE" => match objects.remove(&key) {
                Some(_) => ResponseTemplate::new(204),
                None => ResponseTemplate::new(404),
            },
            _ => ResponseTemplate::new(405),
        }
    }
}

/// One page of `bucket/` names, token is the offset of the next page
fn listing(
    objects: &HashMap<String, (Vec<u8>, String)>,
    bucket_prefix: &str,
    request: &Request,
) -> ResponseTemplate {
    let query: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
    let prefix = query.get("prefix").map(String::as_str).unwrap_or("");
    let offset: usize = query
        .get("pageToken")
        .and_then(|t| t.parse().ok())
        .unwrap_or(0);

    let mut names: Vec<&str> = objects
        .keys()
        .filter_map(|k| k.strip_prefix(bucket_prefix))
        .filter(|name| name.starts_with(prefix))
        .collect();
    names.sort_unstable();

    let page: Vec<_> = names
        .iter()
        .skip(offset)
        .take(LISTING_PAGE_SIZE)
        .map(|name| serde_json::json!({ "name": name }))
        .collect();
    let next = offset + LISTING_PAGE_SIZE;
    let mut body = serde_json::json!({ "items": page });
    if next < names.len() {
        body["nextPageToken"] = serde_json::json!(next.to_string());
    }
    ResponseTemplate::new(200).set_body_json(body)
}

/// Running fake sidecar plus a handle on its stored objects
pub struct FakeSidecar {
    pub server: MockServer,
    objects: Objects,
}

impl FakeSidecar {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let objects: Objects = Arc::default();

        Mock::given(method("POST"))
            .and(path("/object-storage/signed-object-url"))
            .respond_with(SignResponder { base: server.uri() })
            .mount(&server)
            .await;

        Mock::given(path_regex("^/storage/.+"))
            .respond_with(ObjectResponder {
                objects: Arc::clone(&objects),
            })
            .mount(&server)
            .await;

        Self { server, objects }
    }

    pub fn config(&self) -> StorageConfig {
        sidecar_config(&self.server.uri())
    }

    pub fn provider(&self) -> SidecarStorageProvider {
        SidecarStorageProvider::new(&self.config()).expect("sidecar provider")
    }

    /// Raw stored bytes for `bucket/object`
    pub fn stored(&self, full_key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(full_key)
            .map(|(data, _)| data.clone())
    }

    /// Drop a raw object straight into the fake store
    pub fn insert(&self, full_key: &str, data: &[u8]) {
        self.objects.lock().unwrap().insert(
            full_key.to_string(),
            (data.to_vec(), "application/octet-stream".to_string()),
        );
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

pub fn sidecar_config(endpoint: &str) -> StorageConfig {
    StorageConfig {
        provider: ProviderKind::Sidecar,
        bucket: Some(BUCKET.to_string()),
        sidecar_endpoint: Some(endpoint.to_string()),
        encryption_key: Some(RAW_KEY.to_string()),
        ..StorageConfig::default()
    }
}
