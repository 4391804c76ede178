//! Template download: normalizes the three address shapes found in
//! doctor catalogs and fetches the bytes behind them.
//!
//! Catalogs accumulate addresses over years of hand-editing: full
//! signed URLs copied out of a browser (stale token and all), plain
//! remote URLs, and storage-relative paths that sometimes still carry
//! a `sign/` marker and URL-encoded segments. All three must resolve
//! to the same bytes.

use thiserror::Error;

use crate::config::{
    HTTP_TIMEOUT, MAX_DOWNLOAD_BYTES, SIGNED_URL_TTL, SIGN_MARKER, SIGN_PREFIX, TEMPLATE_BUCKET,
};
use crate::storage::{StorageClient, StorageError};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("signed download of '{path}' failed with status {status}")]
    SignedUrl { path: String, status: u16 },

    #[error("download from {url} failed with status {status}")]
    Remote { url: String, status: u16 },

    #[error("storage download of '{path}' failed: {source}")]
    Storage {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("download of '{address}' returned no bytes")]
    EmptyPayload { address: String },

    #[error("download of '{address}' exceeds the {limit}-byte limit")]
    TooLarge { address: String, limit: usize },

    #[error("download transport failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// One catalog address, normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateAddress {
    /// Absolute URL on the signed-object route. The embedded token is
    /// treated as stale; the object is re-signed before download.
    SignedStorageUrl { bucket: String, path: String },

    /// Any other absolute URL, fetched as-is.
    RemoteUrl(String),

    /// Path inside the template bucket.
    StoragePath { bucket: String, path: String },
}

impl TemplateAddress {
    /// Classify a raw catalog address. Storage shapes are stripped of
    /// query strings and stale `sign/` markers and percent-decoded;
    /// remote URLs pass through untouched.
    pub fn classify(address: &str) -> Self {
        let trimmed = address.trim();

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            if let Some(index) = trimmed.find(SIGN_MARKER) {
                let object = decode(strip_query(&trimmed[index + SIGN_MARKER.len()..]));
                let (bucket, path) = match object.split_once('/') {
                    Some((bucket, rest)) if !rest.is_empty() => {
                        (bucket.to_string(), rest.to_string())
                    }
                    _ => (TEMPLATE_BUCKET.to_string(), object),
                };
                return Self::SignedStorageUrl { bucket, path };
            }
            return Self::RemoteUrl(trimmed.to_string());
        }

        let decoded = decode(strip_query(trimmed));
        let stripped = decoded
            .strip_prefix(SIGN_PREFIX)
            .unwrap_or(&decoded)
            .trim_start_matches('/');
        let bucket_prefix = format!("{TEMPLATE_BUCKET}/");
        let path = stripped.strip_prefix(&bucket_prefix).unwrap_or(stripped);
        Self::StoragePath {
            bucket: TEMPLATE_BUCKET.to_string(),
            path: path.to_string(),
        }
    }
}

fn strip_query(address: &str) -> &str {
    let end = address.find(['?', '#']).unwrap_or(address.len());
    &address[..end]
}

fn decode(path: &str) -> String {
    match urlencoding::decode(path) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => path.to_string(),
    }
}

/// Downloads template and branding bytes over HTTP or through the
/// storage client, depending on how the address classifies.
pub struct TemplateFetcher {
    http: reqwest::blocking::Client,
}

impl TemplateFetcher {
    pub fn new() -> Result<Self, DownloadError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self { http })
    }

    pub fn fetch(
        &self,
        address: &str,
        storage: &dyn StorageClient,
    ) -> Result<Vec<u8>, DownloadError> {
        let bytes = match TemplateAddress::classify(address) {
            TemplateAddress::SignedStorageUrl { bucket, path } => {
                tracing::debug!(
                    bucket = %bucket,
                    path = %path,
                    "Fetch: re-signing stale signed URL"
                );
                self.fetch_signed(storage, &bucket, &path)?
            }
            TemplateAddress::RemoteUrl(url) => {
                tracing::debug!(url = %url, "Fetch: downloading remote URL");
                self.fetch_remote(&url)?
            }
            TemplateAddress::StoragePath { bucket, path } => {
                tracing::debug!(bucket = %bucket, path = %path, "Fetch: downloading from storage");
                storage
                    .download(&bucket, &path)
                    .map_err(|source| DownloadError::Storage {
                        path: format!("{bucket}/{path}"),
                        source,
                    })?
            }
        };

        if bytes.is_empty() {
            return Err(DownloadError::EmptyPayload {
                address: address.to_string(),
            });
        }
        if bytes.len() > MAX_DOWNLOAD_BYTES {
            return Err(DownloadError::TooLarge {
                address: address.to_string(),
                limit: MAX_DOWNLOAD_BYTES,
            });
        }
        Ok(bytes)
    }

    fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self.http.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Remote {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }

    fn fetch_signed(
        &self,
        storage: &dyn StorageClient,
        bucket: &str,
        path: &str,
    ) -> Result<Vec<u8>, DownloadError> {
        let signed = storage
            .create_signed_url(bucket, path, SIGNED_URL_TTL)
            .map_err(|source| DownloadError::Storage {
                path: format!("{bucket}/{path}"),
                source,
            })?;
        let response = self.http.get(&signed).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::SignedUrl {
                path: format!("{bucket}/{path}"),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes()?.to_vec())
    }
}
