//! Object storage API calls
//!
//! Thin client over the Cloud Storage JSON API. Objects are addressed either
//! by `(bucket, object)` or by a `gs://bucket/object` URI.

use crate::error::{ClientError, Result};
use crate::{handle_bytes_response, handle_empty_response};
use reqwest::Client;
use tracing::debug;

/// HTTP client for the object store
#[derive(Debug, Clone)]
pub struct StorageClient {
    base_url: String,
    client: Client,
}

impl StorageClient {
    /// Create a client for the public Cloud Storage API
    pub fn new() -> Self {
        Self::with_client("https://storage.googleapis.com", Client::new())
    }

    /// Create a client with a custom API root and HTTP client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Download an object's bytes
    ///
    /// Returns [`ClientError::NotFound`] if the object does not exist.
    pub async fn download(&self, bucket: &str, object: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            bucket,
            urlencoding::encode(object)
        );
        debug!("Downloading gs://{}/{}", bucket, object);

        let response = self
            .client
            .get(&url)
            .query(&[("alt", "media")])
            .send()
            .await?;

        handle_bytes_response(response).await
    }

    /// Upload bytes as an object, replacing any existing object
    pub async fn upload(&self, bucket: &str, object: &str, bytes: Vec<u8>) -> Result<()> {
        let url = format!("{}/upload/storage/v1/b/{}/o", self.base_url, bucket);
        debug!("Uploading {} bytes to gs://{}/{}", bytes.len(), bucket, object);

        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "media"), ("name", object)])
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        handle_empty_response(response).await
    }
}

impl Default for StorageClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a `gs://bucket/object` URI into bucket and object name
pub fn parse_gcs_uri(uri: &str) -> Result<(&str, &str)> {
    let rest = uri
        .strip_prefix("gs://")
        .ok_or_else(|| ClientError::InvalidRequest(format!("not a gs:// URI: {}", uri)))?;

    match rest.split_once('/') {
        Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => Ok((bucket, object)),
        _ => Err(ClientError::InvalidRequest(format!(
            "URI has no object name: {}",
            uri
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gcs_uri() {
        let (bucket, object) = parse_gcs_uri("gs://artifacts/sweep-1/metrics.json").unwrap();
        assert_eq!(bucket, "artifacts");
        assert_eq!(object, "sweep-1/metrics.json");
    }

    #[test]
    fn test_parse_gcs_uri_rejects_malformed() {
        assert!(parse_gcs_uri("s3://bucket/key").is_err());
        assert!(parse_gcs_uri("gs://bucket").is_err());
        assert!(parse_gcs_uri("gs://bucket/").is_err());
        assert!(parse_gcs_uri("gs:///object").is_err());
    }

    #[test]
    fn test_default_base_url() {
        assert_eq!(StorageClient::new().base_url(), "https://storage.googleapis.com");
    }
}
