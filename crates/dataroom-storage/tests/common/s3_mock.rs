//! Wiremock fake of a path-style S3 endpoint
//!
//! Serves `/{bucket}/{key}` objects from memory and `GET /{bucket}?list-type=2`
//! listings, answering errors with S3's XML error bodies.

use super::constants::*;
use dataroom_core::{ProviderKind, StorageConfig};
use dataroom_storage::S3StorageProvider;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const LAST_MODIFIED: &str = "Wed, 01 Oct 2025 12:00:00 GMT";

#[derive(Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    metadata: Vec<(String, String)>,
}

type Objects = Arc<Mutex<BTreeMap<String, StoredObject>>>;

fn error_xml(status: u16, code: &str, key: &str) -> ResponseTemplate {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>{}</Code><Message>{}</Message><Key>{}</Key><RequestId>fake</RequestId></Error>"#,
        code, code, key
    );
    ResponseTemplate::new(status).set_body_raw(body, "application/xml")
}

fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

fn etag(data: &[u8]) -> String {
    format!("\"{}\"", &dataroom_crypto::hash(data)[..32])
}

struct S3Responder {
    objects: Objects,
}

impl S3Responder {
    fn put(&self, objects: &mut BTreeMap<String, StoredObject>, key: String, request: &Request) -> ResponseTemplate {
        if let Some(source) = header(request, "x-amz-copy-source") {
            let source = percent_encoding::percent_decode_str(source.trim_start_matches('/'))
                .decode_utf8_lossy()
                .into_owned();
            let Some(object) = objects.get(&source).cloned() else {
                return error_xml(404, "NoSuchKey", &source);
            };
            let body = format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><CopyObjectResult><ETag>{}</ETag><LastModified>2025-10-01T12:00:00.000Z</LastModified></CopyObjectResult>"#,
                etag(&object.data)
            );
            objects.insert(key, object);
            return ResponseTemplate::new(200).set_body_raw(body, "application/xml");
        }

        let metadata = request
            .headers
            .iter()
            .filter_map(|(name, value)| {
                let name = name.as_str().strip_prefix("x-amz-meta-")?;
                Some((name.to_string(), value.to_str().ok()?.to_string()))
            })
            .collect();
        let object = StoredObject {
            data: request.body.clone(),
            content_type: header(request, "content-type")
                .unwrap_or("binary/octet-stream")
                .to_string(),
            metadata,
        };
        let tag = etag(&object.data);
        objects.insert(key, object);
        ResponseTemplate::new(200).insert_header("ETag", tag.as_str())
    }

    fn list(&self, objects: &BTreeMap<String, StoredObject>, bucket: &str, request: &Request) -> ResponseTemplate {
        let query: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        let prefix = query.get("prefix").cloned().unwrap_or_default();
        let bucket_prefix = format!("{}/", bucket);

        let contents: String = objects
            .iter()
            .filter_map(|(key, object)| Some((key.strip_prefix(&bucket_prefix)?, object)))
            .filter(|(name, _)| name.starts_with(&prefix))
            .map(|(name, object)| {
                format!(
                    "<Contents><Key>{}</Key><Size>{}</Size><StorageClass>STANDARD</StorageClass></Contents>",
                    name,
                    object.data.len()
                )
            })
            .collect();
        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>{}</Name><Prefix>{}</Prefix><MaxKeys>1000</MaxKeys><IsTruncated>false</IsTruncated>{}</ListBucketResult>"#,
            bucket, prefix, contents
        );
        ResponseTemplate::new(200).set_body_raw(body, "application/xml")
    }
}

impl Respond for S3Responder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let path = request.url.path().trim_start_matches('/');
        let path = percent_encoding::percent_decode_str(path)
            .decode_utf8_lossy()
            .into_owned();
        let mut objects = self.objects.lock().unwrap();

        let (bucket, object) = match path.split_once('/') {
            Some((bucket, object)) if !object.is_empty() => (bucket.to_string(), object.to_string()),
            _ => {
                let bucket = path.trim_end_matches('/');
                return match request.method.as_str() {
                    "GET" => self.list(&objects, bucket, request),
                    _ => ResponseTemplate::new(405),
                };
            }
        };
        let key = format!("{}/{}", bucket, object);

        match request.method.as_str() {
            "PUT" => self.put(&mut objects, key, request),
            "GET" => match objects.get(&key) {
                Some(found) => {
                    let mut response = ResponseTemplate::new(200)
                        .set_body_raw(found.data.clone(), found.content_type.as_str())
                        .insert_header("ETag", etag(&found.data).as_str())
                        .insert_header("Last-Modified", LAST_MODIFIED);
                    for (name, value) in &found.metadata {
                        response = response.insert_header(format!("x-amz-meta-{}", name).as_str(), value.as_str());
                    }
                    response
                }
                None => error_xml(404, "NoSuchKey", &object),
            },
            // The server drops HEAD bodies, so a miss is a bare 404
            "HEAD" => match objects.get(&key) {
                Some(found) => {
                    let mut response = ResponseTemplate::new(200)
                        .set_body_raw(found.data.clone(), found.content_type.as_str())
                        .insert_header("ETag", etag(&found.data).as_str())
                        .insert_header("Last-Modified", LAST_MODIFIED);
                    for (name, value) in &found.metadata {
                        response = response.insert_header(format!("x-amz-meta-{}", name).as_str(), value.as_str());
                    }
                    response
                }
                None => ResponseTemplate::new(404),
            },
            "DELETE" => {
                objects.remove(&key);
                ResponseTemplate::new(204)
            }
            _ => ResponseTemplate::new(405),
        }
    }
}

/// Running fake S3 endpoint plus a handle on its stored objects
pub struct FakeS3 {
    pub server: MockServer,
    objects: Objects,
}

impl FakeS3 {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let objects: Objects = Arc::default();

        Mock::given(wiremock::matchers::any())
            .respond_with(S3Responder {
                objects: Arc::clone(&objects),
            })
            .mount(&server)
            .await;

        Self { server, objects }
    }

    pub fn config(&self) -> StorageConfig {
        s3_config(&self.server.uri())
    }

    pub async fn provider(&self) -> S3StorageProvider {
        S3StorageProvider::new(&self.config())
            .await
            .expect("s3 provider")
    }

    /// Raw stored bytes for `bucket/key`
    pub fn stored(&self, full_key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(full_key)
            .map(|object| object.data.clone())
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

/// Path-style S3 config with static credentials against `endpoint`
pub fn s3_config(endpoint: &str) -> StorageConfig {
    StorageConfig {
        provider: ProviderKind::S3,
        bucket: Some(BUCKET.to_string()),
        endpoint: Some(endpoint.to_string()),
        region: Some("us-east-1".to_string()),
        access_key_id: Some("test-access-key".to_string()),
        secret_access_key: Some("test-secret-key".to_string()),
        encryption_key: Some(RAW_KEY.to_string()),
        ..StorageConfig::default()
    }
}
