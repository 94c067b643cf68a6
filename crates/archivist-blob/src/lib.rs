//! Opaque, content-addressed blob storage for uploads and previews
//!. Callers never interpret a key as a filesystem path;
//! [`validate_key`] rejects traversal sequences before any I/O happens,
//! regardless of which backend is selected.

pub mod error;
pub mod local;
pub mod s3;

pub use error::{BlobError, Result};

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;

/// A chunk of a blob's bytes as they stream off the backend.
pub type ByteStream = BoxStream<'static, Result<bytes::Bytes>>;

/// Rejects keys that could be misread as filesystem paths: `..` segments,
/// NUL bytes, and absolute paths. Backends call this before touching
/// storage so a malicious key never reaches the underlying crate.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(BlobError::InvalidKey("key must not be empty".into()));
    }
    if key.contains('\0') {
        return Err(BlobError::InvalidKey("key must not contain NUL bytes".into()));
    }
    if key.split('/').any(|segment| segment == "..") {
        return Err(BlobError::InvalidKey("key must not contain '..' segments".into()));
    }
    if key.starts_with('/') || key.starts_with('\\') {
        return Err(BlobError::InvalidKey("key must not be an absolute path".into()));
    }
    Ok(())
}

/// Generates a fresh, collision-resistant key for a newly uploaded file,
/// preserving the extension for content-type sniffing by downstream
/// collaborators (Preview, AI Gateway's `hint_type`).
pub fn generate_key(original_filename: &str) -> String {
    let ext = std::path::Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    format!("{}.{}", uuid::Uuid::new_v4(), ext)
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
    async fn get(&self, key: &str) -> Result<ByteStream>;
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn delete(&self, key: &str) -> Result<()>;

    /// Presigned URL capability, when the backend supports it. `None` means the backend has no such concept (e.g. the
    /// local filesystem backend); callers fall back to a streamed read.
    /// Presigned URLs are never persisted — see spec.md §9 Open
    /// Questions; the Surface regenerates them on each read.
    async fn presigned_get(&self, key: &str, ttl: Duration) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_key_rejects_traversal_and_nul_and_absolute() {
        assert!(validate_key("../../etc/passwd").is_err());
        assert!(validate_key("a/../b").is_err());
        assert!(validate_key("a\0b").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("").is_err());
        assert!(validate_key("abc123.pdf").is_ok());
        assert!(validate_key("2024/07/abc123.pdf").is_ok());
    }

    #[test]
    fn generate_key_preserves_extension() {
        let key = generate_key("report.pdf");
        assert!(key.ends_with(".pdf"));
        let key = generate_key("noext");
        assert!(key.ends_with(".bin"));
    }
}
