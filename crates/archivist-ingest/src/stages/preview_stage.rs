//! Step E: best-effort preview generation. A preview
//! failure never fails the document — only `preview_key` stays `None`.

use crate::error::{IngestError, Result};
use crate::job::StageId;
use crate::pipeline::{StageContext, StageHandler, StageMetrics, StageOutcome, WorkingSet};
use crate::preview::PreviewGenerator;
use archivist_store::Store;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

pub struct PreviewStage {
    preview: Arc<dyn PreviewGenerator>,
    store: Arc<dyn Store>,
}

impl PreviewStage {
    pub fn new(preview: Arc<dyn PreviewGenerator>, store: Arc<dyn Store>) -> Self {
        Self { preview, store }
    }
}

#[async_trait]
impl StageHandler for PreviewStage {
    fn stage_id(&self) -> StageId {
        StageId::Preview
    }

    async fn execute(&self, ctx: &StageContext, working: &mut WorkingSet) -> Result<StageOutcome> {
        let start = Instant::now();
        let bytes = working.blob_bytes.clone().unwrap_or_default();
        let content_type = working.content_type.clone().unwrap_or_else(|| "application/octet-stream".to_string());

        let preview_key = match self.preview.generate(ctx.doc_id, &bytes, &content_type).await {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(doc_id = ctx.doc_id, error = %err, "preview generation failed, continuing without one");
                None
            }
        };

        let text = working.extracted_text.clone().unwrap_or_default();
        let analysis = working.analysis.clone().unwrap_or_default();
        let keywords = working.keywords.clone().unwrap_or_default();
        let metadata = working.metadata.clone().unwrap_or(serde_json::Value::Null);

        self.store
            .update_content(ctx.doc_id, &text, &analysis, &keywords, metadata, preview_key.as_deref())
            .await?;

        working.preview_key = preview_key.clone();

        Ok(StageOutcome {
            checkpoint_data: preview_key.clone().unwrap_or_default().into_bytes(),
            metrics: StageMetrics { duration_ms: start.elapsed().as_millis() as u64, bytes_processed: bytes.len() },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointManager;
    use archivist_cache::InMemoryCacheBroker;
    use archivist_store::MemStore;

    struct AlwaysKey;

    #[async_trait]
    impl PreviewGenerator for AlwaysKey {
        async fn generate(&self, doc_id: i64, _bytes: &[u8], _content_type: &str) -> Result<Option<String>> {
            Ok(Some(format!("preview/{doc_id}.png")))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl PreviewGenerator for AlwaysFails {
        async fn generate(&self, _doc_id: i64, _bytes: &[u8], _content_type: &str) -> Result<Option<String>> {
            Err(IngestError::Extraction("renderer down".into()))
        }
    }

    fn ctx(doc_id: i64) -> StageContext {
        let checkpoint_mgr = Arc::new(CheckpointManager::new(Arc::new(InMemoryCacheBroker::new())));
        StageContext::new(doc_id, "worker-1".into(), checkpoint_mgr)
    }

    #[tokio::test]
    async fn sets_preview_key_when_generator_succeeds() {
        let store = Arc::new(MemStore::new());
        let doc = store.create_document("report.pdf", "blob-key", None).await.unwrap();
        let stage = PreviewStage::new(Arc::new(AlwaysKey), store.clone());

        let mut working = WorkingSet { blob_bytes: Some(b"bytes".to_vec()), content_type: Some("application/pdf".into()), ..Default::default() };
        stage.execute(&ctx(doc.id), &mut working).await.unwrap();

        assert_eq!(working.preview_key.as_deref(), Some(format!("preview/{}.png", doc.id).as_str()));
    }

    #[tokio::test]
    async fn generator_failure_does_not_fail_the_stage() {
        let store = Arc::new(MemStore::new());
        let doc = store.create_document("report.pdf", "blob-key", None).await.unwrap();
        let stage = PreviewStage::new(Arc::new(AlwaysFails), store.clone());

        let mut working = WorkingSet { blob_bytes: Some(b"bytes".to_vec()), ..Default::default() };
        let outcome = stage.execute(&ctx(doc.id), &mut working).await.unwrap();

        assert!(working.preview_key.is_none());
        assert!(outcome.checkpoint_data.is_empty());
    }
}
