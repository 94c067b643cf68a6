//! Preview generation is explicitly out of scope for this crate (thumbnail
//! *rendering* stays with whatever image/PDF toolchain the operator wires
//! up); the pipeline only depends on this trait, exactly the way
//! `archivist-blob`'s backends sit behind `BlobStore`.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PreviewGenerator: Send + Sync {
    /// Best-effort: `Ok(None)` means "no preview produced", not a failure.
    /// Stage E never fails the document over a preview error.
    async fn generate(&self, doc_id: i64, bytes: &[u8], content_type: &str) -> Result<Option<String>>;
}

/// Default adapter until a real renderer is wired in; always declines.
pub struct NoopPreviewGenerator;

#[async_trait]
impl PreviewGenerator for NoopPreviewGenerator {
    async fn generate(&self, _doc_id: i64, _bytes: &[u8], _content_type: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_generator_declines() {
        let gen = NoopPreviewGenerator;
        assert_eq!(gen.generate(1, b"x", "application/pdf").await.unwrap(), None);
    }
}
