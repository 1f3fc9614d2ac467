use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::application::ports::{ObjectStorage, StorageError};
use crate::domain::ObjectKey;

/// In-memory store for tests.
pub struct MockObjectStore {
    objects: Mutex<HashMap<String, Bytes>>,
    fail_puts: bool,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            fail_puts: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            fail_puts: true,
        }
    }

    pub fn insert(&self, key: &ObjectKey, bytes: Bytes) {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.insert(key.as_str().to_string(), bytes);
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStorage for MockObjectStore {
    async fn put_object(
        &self,
        key: &ObjectKey,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        if self.fail_puts {
            return Err(StorageError::UploadFailed("mock upload failure".to_string()));
        }
        self.insert(key, bytes);
        Ok(())
    }

    async fn get_object_url(
        &self,
        key: &ObjectKey,
        _ttl: Duration,
    ) -> Result<String, StorageError> {
        Ok(format!("mock://bucket/{}", key))
    }

    async fn presign_put(
        &self,
        key: &ObjectKey,
        _ttl: Duration,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        Ok(format!("mock://bucket/{}?presigned=put", key))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StorageError> {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.remove(key.as_str());
        Ok(())
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        Ok(objects.contains_key(key.as_str()))
    }
}
