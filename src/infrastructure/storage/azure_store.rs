use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::azure::{MicrosoftAzure, MicrosoftAzureBuilder};
use object_store::path::Path as StorePath;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use reqwest::Method;

use crate::application::ports::{ObjectStorage, StorageError};
use crate::domain::ObjectKey;

pub struct AzureObjectStore {
    inner: Arc<MicrosoftAzure>,
}

impl AzureObjectStore {
    pub fn new(account: &str, access_key: &str, container: &str) -> Result<Self, StorageError> {
        let store = MicrosoftAzureBuilder::new()
            .with_account(account)
            .with_access_key(access_key)
            .with_container_name(container)
            .build()
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(store),
        })
    }
}

#[async_trait]
impl ObjectStorage for AzureObjectStore {
    async fn put_object(
        &self,
        key: &ObjectKey,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let path = StorePath::from(key.as_str());
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };
        self.inner
            .put_opts(&path, PutPayload::from(bytes), options)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        Ok(())
    }

    async fn get_object_url(
        &self,
        key: &ObjectKey,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let path = StorePath::from(key.as_str());
        let url = self
            .inner
            .signed_url(Method::GET, &path, ttl)
            .await
            .map_err(|e| StorageError::Unsupported(e.to_string()))?;
        Ok(url.to_string())
    }

    async fn presign_put(
        &self,
        key: &ObjectKey,
        ttl: Duration,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let path = StorePath::from(key.as_str());
        let url = self
            .inner
            .signed_url(Method::PUT, &path, ttl)
            .await
            .map_err(|e| StorageError::Unsupported(e.to_string()))?;
        Ok(url.to_string())
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
