use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutPayload};

use crate::application::ports::{ObjectStorage, StorageError};
use crate::domain::ObjectKey;

/// Filesystem backend for development and tests. Cannot presign uploads;
/// the presign endpoint surfaces that as a configuration problem.
pub struct LocalObjectStore {
    inner: Arc<LocalFileSystem>,
    base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&base_path).map_err(StorageError::Io)?;
        let fs = LocalFileSystem::new_with_prefix(&base_path)
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(fs),
            base_path,
        })
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStore {
    async fn put_object(
        &self,
        key: &ObjectKey,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = StorePath::from(key.as_str());
        self.inner
            .put(&path, PutPayload::from(bytes))
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        Ok(())
    }

    async fn get_object_url(
        &self,
        key: &ObjectKey,
        _ttl: Duration,
    ) -> Result<String, StorageError> {
        let full = self.base_path.join(key.as_str());
        Ok(format!("file://{}", full.display()))
    }

    async fn presign_put(
        &self,
        _key: &ObjectKey,
        _ttl: Duration,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        Err(StorageError::Unsupported(
            "local storage cannot presign uploads; configure an s3-compatible backend".to_string(),
        ))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StorageError> {
        let path = StorePath::from(key.as_str());
        self.inner
            .delete(&path)
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        let path = StorePath::from(key.as_str());
        match self.inner.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::DownloadFailed(e.to_string())),
        }
    }
}
