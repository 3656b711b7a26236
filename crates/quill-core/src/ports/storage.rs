//! Binary storage port for post images.

use async_trait::async_trait;

/// Stores uploaded images and hands back a content reference (URL or path).
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist `bytes` and return the reference to record on the post.
    async fn store(&self, original_name: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Remove a previously stored image. Unknown references are ignored.
    async fn remove(&self, reference: &str) -> Result<(), StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(String),

    #[error("Unsupported file: {0}")]
    Unsupported(String),
}
