//! Local-filesystem [`BlobStore`] backend: the default for single-instance deployments and
//! for tests, backed by `object_store`'s `LocalFileSystem`.

use crate::error::{BlobError, Result};
use crate::{validate_key, BlobStore, ByteStream};
use async_trait::async_trait;
use futures::StreamExt;
use object_store::local::LocalFileSystem;
use object_store::{path::Path as ObjectPath, ObjectStore};
use std::sync::Arc;
use std::time::Duration;

pub struct LocalBlobStore {
    inner: Arc<LocalFileSystem>,
}

impl LocalBlobStore {
    pub fn new(root: &str) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| BlobError::Backend(object_store::Error::Generic {
            store: "LocalFileSystem",
            source: Box::new(e),
        }))?;
        let inner = LocalFileSystem::new_with_prefix(root)?;
        Ok(Self { inner: Arc::new(inner) })
    }

    fn object_path(key: &str) -> Result<ObjectPath> {
        validate_key(key)?;
        ObjectPath::parse(key).map_err(|e| BlobError::InvalidKey(e.to_string()))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let path = Self::object_path(key)?;
        self.inner.put(&path, bytes.into()).await?;
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> Result<ByteStream> {
        let path = Self::object_path(key)?;
        if !self.exists(key).await? {
            return Err(BlobError::NotFound(key.to_string()));
        }
        let result = self.inner.get(&path).await?;
        let stream = result.into_stream().map(|chunk| chunk.map_err(BlobError::from));
        Ok(Box::pin(stream))
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

    /// The local backend has no presigning concept; callers fall back to
    /// `get`'s streamed read.
    async fn presigned_get(&self, _key: &str, _ttl: Duration) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips_bytes() {
        let dir = tempfile_dir();
        let store = LocalBlobStore::new(&dir).unwrap();
        store.put("a/b.pdf", b"hello".to_vec(), "application/pdf").await.unwrap();
        assert!(store.exists("a/b.pdf").await.unwrap());

        let mut stream = store.get("a/b.pdf").await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"hello");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let dir = tempfile_dir();
        let store = LocalBlobStore::new(&dir).unwrap();
        let err = store.get("missing.pdf").await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn traversal_key_is_rejected_before_any_io() {
        let dir = tempfile_dir();
        let store = LocalBlobStore::new(&dir).unwrap();
        let err = store.put("../../etc/passwd", b"x".to_vec(), "text/plain").await.unwrap_err();
        assert!(matches!(err, BlobError::InvalidKey(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    fn tempfile_dir() -> String {
        let dir = std::env::temp_dir().join(format!("archivist-blob-test-{}", uuid::Uuid::new_v4()));
        dir.to_string_lossy().into_owned()
    }
}
