//! Step A: fetch the uploaded bytes from Blob Store. A
//! missing blob is terminal — `IngestError::BlobMissing` is never
//! retriable (see `IngestError::is_retriable`).

use crate::error::{IngestError, Result};
use crate::job::StageId;
use crate::pipeline::{StageContext, StageHandler, StageMetrics, StageOutcome, WorkingSet};
use archivist_blob::{BlobError, BlobStore};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;

pub struct FetchBlobStage {
    blob: Arc<dyn BlobStore>,
}

impl FetchBlobStage {
    pub fn new(blob: Arc<dyn BlobStore>) -> Self {
        Self { blob }
    }
}

#[async_trait]
impl StageHandler for FetchBlobStage {
    fn stage_id(&self) -> StageId {
        StageId::FetchBlob
    }

    async fn execute(&self, _ctx: &StageContext, working: &mut WorkingSet) -> Result<StageOutcome> {
        let start = Instant::now();
        let key = working
            .blob_key
            .clone()
            .ok_or_else(|| IngestError::BlobMissing("no blob_key on working set".into()))?;

        let mut stream = self.blob.get(&key).await.map_err(|err| match err {
            BlobError::NotFound(k) => IngestError::BlobMissing(k),
            other => IngestError::Blob(other),
        })?;

        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk.map_err(IngestError::Blob)?);
        }

        let content_type = guess_content_type(working.filename.as_deref().unwrap_or(""));
        let bytes_processed = bytes.len();
        working.content_type = Some(content_type);
        working.blob_bytes = Some(bytes.clone());

        Ok(StageOutcome {
            checkpoint_data: bytes,
            metrics: StageMetrics {
                duration_ms: start.elapsed().as_millis() as u64,
                bytes_processed,
            },
        })
    }
}

fn guess_content_type(filename: &str) -> String {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "text/plain",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointManager;
    use archivist_blob::local::LocalBlobStore;
    use archivist_cache::InMemoryCacheBroker;

    fn tmp_dir() -> String {
        std::env::temp_dir().join(format!("archivist-fetch-{}", uuid::Uuid::new_v4())).to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn fetches_bytes_and_infers_content_type() {
        let dir = tmp_dir();
        let blob: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&dir).unwrap());
        blob.put("a.pdf", b"%PDF-1.4 stub".to_vec(), "application/pdf").await.unwrap();

        let stage = FetchBlobStage::new(blob);
        let checkpoint_mgr = Arc::new(CheckpointManager::new(Arc::new(InMemoryCacheBroker::new())));
        let ctx = StageContext::new(1, "worker-1".into(), checkpoint_mgr);
        let mut working = WorkingSet { filename: Some("report.pdf".into()), blob_key: Some("a.pdf".into()), ..Default::default() };

        let outcome = stage.execute(&ctx, &mut working).await.unwrap();
        assert_eq!(working.blob_bytes.as_deref(), Some(b"%PDF-1.4 stub".as_slice()));
        assert_eq!(working.content_type.as_deref(), Some("application/pdf"));
        assert!(outcome.metrics.bytes_processed > 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_blob_is_terminal() {
        let dir = tmp_dir();
        let blob: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(&dir).unwrap());
        let stage = FetchBlobStage::new(blob);
        let checkpoint_mgr = Arc::new(CheckpointManager::new(Arc::new(InMemoryCacheBroker::new())));
        let ctx = StageContext::new(1, "worker-1".into(), checkpoint_mgr);
        let mut working = WorkingSet { blob_key: Some("missing.pdf".into()), ..Default::default() };

        let err = stage.execute(&ctx, &mut working).await.unwrap_err();
        assert!(matches!(err, IngestError::BlobMissing(_)));
        assert!(!err.is_retriable());
        std::fs::remove_dir_all(&dir).ok();
    }
}
