//! Step D: generate the search vector for the extracted
//! text. Whether a failed embed call fails the document or lets it
//! complete without a `search_vector` is controlled by
//! `allow_partial_completion_on_embedding_failure`.

use crate::error::{IngestError, Result};
use crate::job::StageId;
use crate::pipeline::{StageContext, StageHandler, StageMetrics, StageOutcome, WorkingSet};
use archivist_ai::AiGateway;
use archivist_store::Store;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

pub struct EmbedStage {
    ai: Arc<AiGateway>,
    store: Arc<dyn Store>,
    vector_dim: usize,
    allow_partial: bool,
}

impl EmbedStage {
    pub fn new(ai: Arc<AiGateway>, store: Arc<dyn Store>, vector_dim: usize, allow_partial: bool) -> Self {
        Self { ai, store, vector_dim, allow_partial }
    }
}

#[async_trait]
impl StageHandler for EmbedStage {
    fn stage_id(&self) -> StageId {
        StageId::Embed
    }

    async fn execute(&self, ctx: &StageContext, working: &mut WorkingSet) -> Result<StageOutcome> {
        let start = Instant::now();
        let text = working
            .extracted_text
            .clone()
            .ok_or_else(|| IngestError::Extraction("no extracted_text on working set".into()))?;

        let vector = match self.ai.embed(&text, self.vector_dim).await {
            Ok(v) => v,
            Err(err) if self.allow_partial => {
                tracing::warn!(doc_id = ctx.doc_id, error = %err, "embedding failed, completing without search_vector");
                working.embedding = None;
                return Ok(StageOutcome {
                    checkpoint_data: Vec::new(),
                    metrics: StageMetrics { duration_ms: start.elapsed().as_millis() as u64, bytes_processed: 0 },
                });
            }
            Err(err) => return Err(IngestError::Embedding(err.to_string())),
        };

        self.store.update_embedding(ctx.doc_id, &vector).await?;
        let bytes_processed = vector.len() * std::mem::size_of::<f32>();
        let checkpoint_data = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
        working.embedding = Some(vector);

        Ok(StageOutcome {
            checkpoint_data,
            metrics: StageMetrics { duration_ms: start.elapsed().as_millis() as u64, bytes_processed },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointManager;
    use archivist_ai::providers::{MockBehavior, MockProvider};
    use archivist_ai::{AiError, Capabilities};
    use archivist_cache::InMemoryCacheBroker;
    use archivist_store::MemStore;

    fn ctx(doc_id: i64) -> StageContext {
        let checkpoint_mgr = Arc::new(CheckpointManager::new(Arc::new(InMemoryCacheBroker::new())));
        StageContext::new(doc_id, "worker-1".into(), checkpoint_mgr)
    }

    #[tokio::test]
    async fn embeds_and_persists_vector() {
        let store = Arc::new(MemStore::new());
        let doc = store.create_document("report.pdf", "blob-key", None).await.unwrap();

        let provider = Arc::new(
            MockProvider::new("mock", Capabilities { extract: false, analyze: false, embed: true })
                .with_embedding(vec![0.5; 4]),
        );
        let ai = Arc::new(AiGateway::new(vec![provider]));
        let stage = EmbedStage::new(ai, store.clone(), 4, false);

        let mut working = WorkingSet { extracted_text: Some("text".into()), ..Default::default() };
        stage.execute(&ctx(doc.id), &mut working).await.unwrap();

        assert_eq!(working.embedding, Some(vec![0.5; 4]));
    }

    #[tokio::test]
    async fn partial_completion_swallows_failure_when_allowed() {
        let store = Arc::new(MemStore::new());
        let doc = store.create_document("report.pdf", "blob-key", None).await.unwrap();

        let provider = Arc::new(
            MockProvider::new("mock", Capabilities { extract: false, analyze: false, embed: true })
                .with_behavior(MockBehavior::Fail(AiError::QuotaExhausted("out".into()))),
        );
        let ai = Arc::new(AiGateway::new(vec![provider]));
        let stage = EmbedStage::new(ai, store.clone(), 4, true);

        let mut working = WorkingSet { extracted_text: Some("text".into()), ..Default::default() };
        let outcome = stage.execute(&ctx(doc.id), &mut working).await.unwrap();

        assert!(working.embedding.is_none());
        assert!(outcome.checkpoint_data.is_empty());
    }

    #[tokio::test]
    async fn hard_failure_propagates_when_partial_not_allowed() {
        let store = Arc::new(MemStore::new());
        let doc = store.create_document("report.pdf", "blob-key", None).await.unwrap();

        let provider = Arc::new(
            MockProvider::new("mock", Capabilities { extract: false, analyze: false, embed: true })
                .with_behavior(MockBehavior::Fail(AiError::QuotaExhausted("out".into()))),
        );
        let ai = Arc::new(AiGateway::new(vec![provider]));
        let stage = EmbedStage::new(ai, store.clone(), 4, false);

        let mut working = WorkingSet { extracted_text: Some("text".into()), ..Default::default() };
        let err = stage.execute(&ctx(doc.id), &mut working).await.unwrap_err();
        assert!(matches!(err, IngestError::Embedding(_)));
    }
}
