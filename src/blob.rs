use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("not_found")]
    NotFound,
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("other: {0}")]
    Other(String),
}

/// Physical object store keyed by bare filename. The attachment manager
/// derives the name from the tail segment of a file record's link.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), BlobError>;
    async fn load(&self, name: &str) -> Result<Vec<u8>, BlobError>;
    async fn unlink(&self, name: &str) -> Result<(), BlobError>;
}

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new() -> Self {
        let root = std::env::var("AGORA_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));
        info!(root = %root.display(), "using filesystem blob store");
        Self { root }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, BlobError> {
        // names come from link tail segments; anything path-like is rejected
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
            return Err(BlobError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

impl Default for FsBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let path = self.path_for(name)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| BlobError::Other(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| BlobError::Other(e.to_string()))
    }

    async fn load(&self, name: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound),
            Err(e) => Err(BlobError::Other(e.to_string())),
        }
    }

    async fn unlink(&self, name: &str) -> Result<(), BlobError> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound),
            Err(e) => Err(BlobError::Other(e.to_string())),
        }
    }
}
