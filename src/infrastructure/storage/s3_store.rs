use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as StorePath;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use reqwest::Method;

use crate::application::ports::{ObjectStorage, StorageError};
use crate::domain::ObjectKey;

/// S3-compatible backend. An explicit endpoint makes it speak to MinIO
/// and the other S3 clones.
pub struct S3ObjectStore {
    inner: Arc<AmazonS3>,
}

impl S3ObjectStore {
    pub fn new(
        bucket: &str,
        region: &str,
        access_key_id: &str,
        secret_access_key: &str,
        endpoint: Option<&str>,
    ) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(region)
            .with_access_key_id(access_key_id)
            .with_secret_access_key(secret_access_key);
        if let Some(endpoint) = endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        let store = builder
            .build()
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(store),
        })
    }
}

fn map_error(e: object_store::Error) -> StorageError {
    match e {
        object_store::Error::NotFound { .. } => StorageError::NotFound(e.to_string()),
        _ => StorageError::UploadFailed(e.to_string()),
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStore {
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
            Err(e) => Err(map_error(e)),
        }
    }
}
