use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::ObjectKey;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(
        &self,
        key: &ObjectKey,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn get_object_url(&self, key: &ObjectKey, ttl: Duration)
        -> Result<String, StorageError>;

    async fn presign_put(
        &self,
        key: &ObjectKey,
        ttl: Duration,
        content_type: &str,
    ) -> Result<String, StorageError>;

    async fn delete(&self, key: &ObjectKey) -> Result<(), StorageError>;

    async fn exists(&self, key: &ObjectKey) -> Result<bool, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("delete failed: {0}")]
    DeleteFailed(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("presigning not supported: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::UploadFailed(_) | StorageError::DownloadFailed(_) | StorageError::Io(_)
        )
    }
}
