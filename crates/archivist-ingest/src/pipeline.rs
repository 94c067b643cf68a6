//! The per-document stage contract, generalized
//! from the teacher's file/bincode-cache `StageHandler` to the document
//! concepts each step actually passes along: blob bytes, extracted text,
//! AI analysis, an embedding, a preview key.

use crate::checkpoint::CheckpointManager;
use crate::dag::CheckpointKeys;
use crate::error::Result;
use crate::job::StageId;
use archivist_core::model::AiAnalysis;
use async_trait::async_trait;
use std::sync::Arc;

/// Context shared by every stage of a single document's run.
#[derive(Clone)]
pub struct StageContext {
    pub doc_id: i64,
    pub worker_id: String,
    pub checkpoint_mgr: Arc<CheckpointManager>,
    pub keys: CheckpointKeys,
}

impl StageContext {
    pub fn new(doc_id: i64, worker_id: String, checkpoint_mgr: Arc<CheckpointManager>) -> Self {
        Self { doc_id, worker_id, checkpoint_mgr, keys: CheckpointKeys::new(doc_id) }
    }
}

/// Accumulated state threaded through the A-E chain; each stage reads what
/// a predecessor left and fills in its own piece.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    pub filename: Option<String>,
    pub blob_key: Option<String>,
    pub blob_bytes: Option<Vec<u8>>,
    pub content_type: Option<String>,
    pub extracted_text: Option<String>,
    pub analysis: Option<AiAnalysis>,
    pub keywords: Option<Vec<String>>,
    pub metadata: Option<serde_json::Value>,
    pub embedding: Option<Vec<f32>>,
    pub preview_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StageMetrics {
    pub duration_ms: u64,
    pub bytes_processed: usize,
}

pub struct StageOutcome {
    pub checkpoint_data: Vec<u8>,
    pub metrics: StageMetrics,
}

#[async_trait]
pub trait StageHandler: Send + Sync {
    fn stage_id(&self) -> StageId;

    /// Runs the stage, mutating `working` in place and returning the bytes
    /// worth checkpointing for crash-resilient resume.
    async fn execute(&self, ctx: &StageContext, working: &mut WorkingSet) -> Result<StageOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_cache::InMemoryCacheBroker;
    use std::time::Instant;

    struct EchoStage;

    #[async_trait]
    impl StageHandler for EchoStage {
        fn stage_id(&self) -> StageId {
            StageId::FetchBlob
        }

        async fn execute(&self, _ctx: &StageContext, working: &mut WorkingSet) -> Result<StageOutcome> {
            let start = Instant::now();
            working.blob_bytes = Some(b"hello".to_vec());
            Ok(StageOutcome {
                checkpoint_data: b"hello".to_vec(),
                metrics: StageMetrics { duration_ms: start.elapsed().as_millis() as u64, bytes_processed: 5 },
            })
        }
    }

    #[tokio::test]
    async fn stage_mutates_working_set_and_returns_checkpoint_bytes() {
        let checkpoint_mgr = Arc::new(CheckpointManager::new(Arc::new(InMemoryCacheBroker::new())));
        let ctx = StageContext::new(1, "worker-1".to_string(), checkpoint_mgr);
        let mut working = WorkingSet::default();

        let outcome = EchoStage.execute(&ctx, &mut working).await.unwrap();

        assert_eq!(working.blob_bytes, Some(b"hello".to_vec()));
        assert_eq!(outcome.checkpoint_data, b"hello".to_vec());
        assert_eq!(outcome.metrics.bytes_processed, 5);
    }
}
