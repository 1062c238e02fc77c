//! Object storage for generated assets.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use storyreel_core::storage::validate_object_path;

use crate::error::body_text;

/// Errors from an [`ObjectStore`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Fetch failed ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Durable storage addressed by relative object paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path` and return the public URL it is served from.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Read the bytes behind a public URL.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError>;
}

/// Filesystem-backed store served under a public base URL.
///
/// URLs under the base are read straight from disk; any other URL is
/// fetched over HTTP.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
    client: reqwest::Client,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a URL to the local file it names, if it is one of ours.
    fn local_path(&self, url: &str) -> Option<PathBuf> {
        let rest = url.strip_prefix(&self.public_base_url)?.strip_prefix('/')?;
        validate_object_path(rest).ok()?;
        Some(self.root.join(rest))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        validate_object_path(path).map_err(|e| StorageError::InvalidPath(e.to_string()))?;
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;
        tracing::debug!(path, content_type, size = bytes.len(), "Stored object");
        Ok(format!("{}/{path}", self.public_base_url))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, StorageError> {
        if let Some(path) = self.local_path(url) {
            return match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    Err(StorageError::NotFound(url.to_string()))
                }
                Err(e) => Err(e.into()),
            };
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(StorageError::Api {
                status: status.as_u16(),
                body: body_text(response).await,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn upload_then_fetch_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://media.test/files/");

        let url = store
            .upload("shot-lists/1/scene-001/image-a.png", b"png".to_vec(), "image/png")
            .await
            .unwrap();

        assert_eq!(url, "http://media.test/files/shot-lists/1/scene-001/image-a.png");
        assert!(dir.path().join("shot-lists/1/scene-001/image-a.png").exists());
        assert_eq!(store.fetch(&url).await.unwrap(), b"png");
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://media.test");

        assert_matches!(
            store.upload("../outside.png", vec![1], "image/png").await,
            Err(StorageError::InvalidPath(_))
        );
    }

    #[tokio::test]
    async fn missing_local_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://media.test");

        assert_matches!(
            store.fetch("http://media.test/shot-lists/9/gone.png").await,
            Err(StorageError::NotFound(_))
        );
    }
}
