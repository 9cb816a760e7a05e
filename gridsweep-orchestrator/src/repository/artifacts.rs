//! Artifact store repository
//!
//! Blob storage holding each job's model artifact and metrics file.
//! Paths are full URIs such as `gs://bucket/sweep-3/metrics.json`.

use async_trait::async_trait;
use gridsweep_client::{ClientError, StorageClient, parse_gcs_uri};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised by an artifact store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("invalid blob path: {0}")]
    InvalidPath(String),

    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage request failed: {0}")]
    Remote(#[from] ClientError),
}

/// Repository trait for blob storage
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Reads a whole blob
    ///
    /// Returns [`StoreError::NotFound`] if nothing is stored at `path`.
    async fn read_blob(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Writes a whole blob, replacing any previous content
    async fn write_blob(&self, path: &str, bytes: Vec<u8>) -> Result<(), StoreError>;
}

/// Cloud Storage implementation of ArtifactStore
pub struct GcsArtifactStore {
    client: StorageClient,
}

impl GcsArtifactStore {
    pub fn new(client: StorageClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactStore for GcsArtifactStore {
    async fn read_blob(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let (bucket, object) =
            parse_gcs_uri(path).map_err(|_| StoreError::InvalidPath(path.to_string()))?;

        match self.client.download(bucket, object).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.is_not_found() => Err(StoreError::NotFound(path.to_string())),
            Err(e) => Err(StoreError::Remote(e)),
        }
    }

    async fn write_blob(&self, path: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let (bucket, object) =
            parse_gcs_uri(path).map_err(|_| StoreError::InvalidPath(path.to_string()))?;

        self.client.upload(bucket, object, bytes).await?;
        Ok(())
    }
}

/// Filesystem implementation of ArtifactStore
///
/// `scheme://bucket/key` is stored at `{root}/bucket/key`, so the same
/// artifact layout works against a local mirror of the bucket.
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a blob path onto the filesystem, refusing to escape the root
    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = match path.split_once("://") {
            Some((_, rest)) => rest,
            None => path,
        };
        let relative = Path::new(relative.trim_start_matches('/'));

        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(StoreError::InvalidPath(path.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn read_blob(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let file = self.resolve(path)?;
        debug!("Reading blob {} from {}", path, file.display());

        tokio::fs::read(&file).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(path.to_string()),
            _ => StoreError::Io {
                path: path.to_string(),
                source: e,
            },
        })
    }

    async fn write_blob(&self, path: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let file = self.resolve(path)?;
        let io_err = |source| StoreError::Io {
            path: path.to_string(),
            source,
        };

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&file, bytes).await.map_err(io_err)
    }
}
