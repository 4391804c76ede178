//! Storage collaborator: a bucket-object HTTP API behind a trait.
//!
//! The engine owns no durable state. Templates come out of storage,
//! finished reports go back in, and everything crosses this seam so
//! tests can swap in [`MockStorage`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::HTTP_TIMEOUT;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage API unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("storage API timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage API returned {status} for '{path}': {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("destination bucket '{bucket}' does not exist")]
    BucketMissing { bucket: String },

    #[error("object '{key}' already exists in bucket '{bucket}'")]
    Conflict { bucket: String, key: String },

    #[error("upload failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("upload transport failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// The collaborator seam. One implementation talks to the clinic's
/// storage API; tests use the in-memory mock.
pub trait StorageClient: Send + Sync {
    /// Mint a short-lived signed URL for a private object.
    fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<String, StorageError>;

    fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Write an object. Non-overwriting unless `overwrite` is set; a
    /// collision surfaces as [`UploadError::Conflict`], never a silent
    /// clobber.
    fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), UploadError>;

    /// Long-lived retrieval address for a stored object.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// Destination key for one finished report. Combines the consultation
/// with a timestamp and a random suffix so concurrent generations for
/// the same consultation never collide.
pub fn object_key(consultation_id: &str, now: DateTime<Utc>) -> String {
    let consultation: String = consultation_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    let stamp = now.format("%Y%m%d%H%M%S");
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{consultation}/informe-{stamp}-{}.docx", &uuid[..8])
}

// ─── HTTP implementation ────────────────────────────────────────────────────

/// Client for a bucket-object storage HTTP API with bearer auth.
/// Object routes follow the `/object/{bucket}/{path}` convention, with
/// `/object/sign/…` for signed URLs and `/object/public/…` for public
/// addresses.
pub struct HttpStorageClient {
    base_url: String,
    api_key: String,
    http: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl", alias = "url")]
    signed_url: String,
}

impl HttpStorageClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, StorageError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }

    fn object_url(&self, prefix: &str, bucket: &str, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/object/{prefix}{bucket}/{path}", self.base_url)
    }

    /// Signed URLs come back bucket-relative; make them absolute.
    fn absolutize(&self, url: String) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url
        } else {
            format!("{}{}", self.base_url, ensure_leading_slash(&url))
        }
    }
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

fn map_transport(err: reqwest::Error) -> StorageError {
    if err.is_timeout() {
        StorageError::Timeout(err)
    } else if err.is_connect() {
        StorageError::Unreachable(err)
    } else {
        StorageError::Http(err)
    }
}

impl StorageClient for HttpStorageClient {
    fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let url = self.object_url("sign/", bucket, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "expiresIn": ttl.as_secs() }))
            .send()
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                path: format!("{bucket}/{path}"),
                status: status.as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }

        let parsed: SignResponse = response.json().map_err(StorageError::Http)?;
        Ok(self.absolutize(parsed.signed_url))
    }

    fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.object_url("", bucket, path);
        tracing::debug!(bucket = %bucket, path = %path, "Storage: downloading object");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .map_err(map_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                path: format!("{bucket}/{path}"),
                status: status.as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }
        Ok(response.bytes().map_err(StorageError::Http)?.to_vec())
    }

    fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
        overwrite: bool,
    ) -> Result<(), UploadError> {
        let url = self.object_url("", bucket, key);
        tracing::info!(
            bucket = %bucket,
            key = %key,
            size = bytes.len(),
            "Storage: uploading object"
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", content_type)
            .header("x-upsert", if overwrite { "true" } else { "false" })
            .body(bytes.to_vec())
            .send()?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(());
        }
        let message = response.text().unwrap_or_default();
        let lowered = message.to_lowercase();
        if status == 409 || lowered.contains("duplicate") || lowered.contains("already exists") {
            return Err(UploadError::Conflict {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        if status == 404 && lowered.contains("bucket") {
            return Err(UploadError::BucketMissing {
                bucket: bucket.to_string(),
            });
        }
        Err(UploadError::Status { status, message })
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        self.object_url("public/", bucket, key)
    }
}

// ─── Mock ───────────────────────────────────────────────────────────────────

/// In-memory storage for tests: serves seeded objects and records
/// uploads.
pub struct MockStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    missing_buckets: Vec<String>,
    signed_base: String,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            missing_buckets: Vec::new(),
            signed_base: "http://storage.invalid/signed".to_string(),
        }
    }

    pub fn with_object(self, bucket: &str, path: &str, bytes: &[u8]) -> Self {
        self.store().insert(format!("{bucket}/{path}"), bytes.to_vec());
        self
    }

    /// Uploads into `bucket` fail with [`UploadError::BucketMissing`].
    pub fn with_missing_bucket(mut self, bucket: &str) -> Self {
        self.missing_buckets.push(bucket.to_string());
        self
    }

    /// Base URL minted signed URLs point at; point it at a test server
    /// to exercise the signed-fetch path.
    pub fn with_signed_base(mut self, base: &str) -> Self {
        self.signed_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.store().get(&format!("{bucket}/{key}")).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.store().len()
    }

    /// A poisoned lock only means another test thread panicked mid-write.
    fn store(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageClient for MockStorage {
    fn create_signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        Ok(format!(
            "{}/{bucket}/{path}?token=mock&expires={}",
            self.signed_base,
            ttl.as_secs()
        ))
    }

    fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        self.object(bucket, path).ok_or_else(|| StorageError::Status {
            path: format!("{bucket}/{path}"),
            status: 404,
            message: "Object not found".to_string(),
        })
    }

    fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
        overwrite: bool,
    ) -> Result<(), UploadError> {
        if self.missing_buckets.iter().any(|b| b == bucket) {
            return Err(UploadError::BucketMissing {
                bucket: bucket.to_string(),
            });
        }
        let mut objects = self.store();
        let full = format!("{bucket}/{key}");
        if !overwrite && objects.contains_key(&full) {
            return Err(UploadError::Conflict {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        objects.insert(full, bytes.to_vec());
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("http://storage.invalid/public/{bucket}/{key}")
    }
}

/// One-connection HTTP server for exercising the blocking client in
/// tests. Serves the canned response and closes.
#[cfg(test)]
pub(crate) fn oneshot_server(response: String) -> String {
    use std::io::{Read, Write};

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 8192];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(response.as_bytes());
        }
    });
    format!("http://{addr}")
}

#[cfg(test)]
pub(crate) fn http_response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- object keys ---------------------------------------------------

    #[test]
    fn object_keys_nest_under_the_consultation() {
        let now = Utc::now();
        let key = object_key("c-2041", now);
        assert!(key.starts_with("c-2041/informe-"), "key: {key}");
        assert!(key.ends_with(".docx"), "key: {key}");
    }

    #[test]
    fn object_keys_are_collision_resistant() {
        let now = Utc::now();
        assert_ne!(object_key("c-2041", now), object_key("c-2041", now));
    }

    #[test]
    fn object_keys_sanitize_path_characters() {
        // Each unsafe character maps to its own dash: `..` + `/` -> `---`.
        let key = object_key("../etc/passwd", Utc::now());
        assert!(key.starts_with("---etc-passwd/"), "key: {key}");
        assert!(!key[..key.len() - ".docx".len()].contains('.'), "key: {key}");
    }

    // -- mock ----------------------------------------------------------

    #[test]
    fn mock_serves_seeded_objects() {
        let storage = MockStorage::new().with_object("plantillas", "a.docx", b"PK\x03\x04");
        assert_eq!(storage.download("plantillas", "a.docx").unwrap(), b"PK\x03\x04");
        assert!(matches!(
            storage.download("plantillas", "otra.docx"),
            Err(StorageError::Status { status: 404, .. })
        ));
    }

    #[test]
    fn mock_surfaces_upload_collisions() {
        let storage = MockStorage::new();
        storage
            .upload("informes", "c/x.docx", b"a", "application/octet-stream", false)
            .unwrap();
        let err = storage
            .upload("informes", "c/x.docx", b"b", "application/octet-stream", false)
            .unwrap_err();
        assert!(matches!(err, UploadError::Conflict { .. }));

        storage
            .upload("informes", "c/x.docx", b"b", "application/octet-stream", true)
            .unwrap();
        assert_eq!(storage.object("informes", "c/x.docx").unwrap(), b"b");
    }

    #[test]
    fn mock_reports_missing_buckets() {
        let storage = MockStorage::new().with_missing_bucket("informes");
        let err = storage
            .upload("informes", "k", b"x", "application/octet-stream", false)
            .unwrap_err();
        assert!(matches!(err, UploadError::BucketMissing { bucket } if bucket == "informes"));
    }

    // -- HTTP client ---------------------------------------------------

    #[test]
    fn urls_follow_the_object_route_convention() {
        let client = HttpStorageClient::new("http://storage.local/storage/v1/", "key").unwrap();
        assert_eq!(
            client.object_url("", "plantillas", "dr/x.docx"),
            "http://storage.local/storage/v1/object/plantillas/dr/x.docx"
        );
        assert_eq!(
            client.public_url("informes", "c/x.docx"),
            "http://storage.local/storage/v1/object/public/informes/c/x.docx"
        );
    }

    #[test]
    fn download_returns_body_bytes() {
        let base = oneshot_server(http_response("200 OK", "PKbytes"));
        let client = HttpStorageClient::new(&base, "key").unwrap();
        assert_eq!(client.download("plantillas", "x.docx").unwrap(), b"PKbytes");
    }

    #[test]
    fn download_maps_error_statuses() {
        let base = oneshot_server(http_response("404 Not Found", "Object not found"));
        let client = HttpStorageClient::new(&base, "key").unwrap();
        let err = client.download("plantillas", "x.docx").unwrap_err();
        match err {
            StorageError::Status { status, path, .. } => {
                assert_eq!(status, 404);
                assert_eq!(path, "plantillas/x.docx");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn signed_urls_are_made_absolute() {
        let body = r#"{"signedURL":"/object/sign/plantillas/x.docx?token=abc"}"#;
        let base = oneshot_server(http_response("200 OK", body));
        let client = HttpStorageClient::new(&base, "key").unwrap();
        let url = client
            .create_signed_url("plantillas", "x.docx", Duration::from_secs(300))
            .unwrap();
        assert_eq!(
            url,
            format!("{base}/object/sign/plantillas/x.docx?token=abc")
        );
    }

    #[test]
    fn upload_conflicts_are_distinguished() {
        let base = oneshot_server(http_response("409 Conflict", "Duplicate object"));
        let client = HttpStorageClient::new(&base, "key").unwrap();
        let err = client
            .upload("informes", "c/x.docx", b"data", "application/octet-stream", false)
            .unwrap_err();
        assert!(matches!(err, UploadError::Conflict { .. }));
    }

    #[test]
    fn upload_missing_bucket_is_distinguished() {
        let base = oneshot_server(http_response("404 Not Found", "Bucket not found"));
        let client = HttpStorageClient::new(&base, "key").unwrap();
        let err = client
            .upload("informes", "c/x.docx", b"data", "application/octet-stream", false)
            .unwrap_err();
        assert!(matches!(err, UploadError::BucketMissing { .. }));
    }
}
