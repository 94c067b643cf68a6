//! Step B: `AI.extract_text` with the detected hint type.
//! The OCR fallback and per-provider retry/circuit-breaking live in
//! `archivist_ai::AiGateway` itself; this stage only wires the bytes in
//! and the text out.

use crate::error::Result;
use crate::job::StageId;
use crate::pipeline::{StageContext, StageHandler, StageMetrics, StageOutcome, WorkingSet};
use archivist_ai::{AiGateway, HintType};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

pub struct ExtractTextStage {
    ai: Arc<AiGateway>,
}

impl ExtractTextStage {
    pub fn new(ai: Arc<AiGateway>) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl StageHandler for ExtractTextStage {
    fn stage_id(&self) -> StageId {
        StageId::ExtractText
    }

    async fn execute(&self, _ctx: &StageContext, working: &mut WorkingSet) -> Result<StageOutcome> {
        let start = Instant::now();
        let bytes = working.blob_bytes.clone().unwrap_or_default();
        let hint = HintType::from_extension(
            std::path::Path::new(working.filename.as_deref().unwrap_or(""))
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or(""),
        );

        let extracted = self.ai.extract_text(&bytes, hint).await?;
        let bytes_processed = extracted.text.len();
        working.extracted_text = Some(extracted.text.clone());

        Ok(StageOutcome {
            checkpoint_data: extracted.text.into_bytes(),
            metrics: StageMetrics { duration_ms: start.elapsed().as_millis() as u64, bytes_processed },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointManager;
    use archivist_ai::providers::MockProvider;
    use archivist_ai::Capabilities;
    use archivist_cache::InMemoryCacheBroker;

    #[tokio::test]
    async fn extracts_text_via_gateway() {
        let provider = Arc::new(MockProvider::new("mock", Capabilities { extract: true, analyze: false, embed: false }));
        let gateway = Arc::new(AiGateway::new(vec![provider]));
        let stage = ExtractTextStage::new(gateway);

        let checkpoint_mgr = Arc::new(CheckpointManager::new(Arc::new(InMemoryCacheBroker::new())));
        let ctx = StageContext::new(1, "worker-1".into(), checkpoint_mgr);
        let mut working = WorkingSet { filename: Some("report.pdf".into()), blob_bytes: Some(b"bytes".to_vec()), ..Default::default() };

        stage.execute(&ctx, &mut working).await.unwrap();
        assert!(working.extracted_text.is_some());
    }
}
