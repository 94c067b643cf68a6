//! S3-compatible [`BlobStore`] backend,
//! selectable alongside the local backend for multi-instance deployments.

use crate::error::{BlobError, Result};
use crate::{validate_key, BlobStore, ByteStream};
use async_trait::async_trait;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::ObjectStore;
use std::sync::Arc;
use std::time::Duration;

pub struct S3BlobStore {
    inner: Arc<AmazonS3>,
}

impl S3BlobStore {
    pub fn new(bucket: &str) -> Result<Self> {
        let inner = AmazonS3Builder::from_env().with_bucket_name(bucket).build()?;
        Ok(Self { inner: Arc::new(inner) })
    }

    fn object_path(key: &str) -> Result<ObjectPath> {
        validate_key(key)?;
        ObjectPath::parse(key).map_err(|e| BlobError::InvalidKey(e.to_string()))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let path = Self::object_path(key)?;
        self.inner.put(&path, bytes.into()).await?;
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> Result<ByteStream> {
        let path = Self::object_path(key)?;
        match self.inner.get(&path).await {
            Ok(result) => {
                let stream = result.into_stream().map(|chunk| chunk.map_err(BlobError::from));
                Ok(Box::pin(stream))
            }
            Err(object_store::Error::NotFound { .. }) => Err(BlobError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = Self::object_path(key)?;
        match self.inner.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = Self::object_path(key)?;
        match self.inner.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// S3 natively supports presigned GET URLs; the Surface regenerates
    /// one on every `/documents/{id}/download` call rather than
    /// persisting it.
    async fn presigned_get(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        let path = Self::object_path(key)?;
        let url = self.inner.signed_url(http::Method::GET, &path, ttl).await?;
        Ok(Some(url.to_string()))
    }
}
