//! Step C: `AI.analyze` against the current taxonomy
//! snapshot, then drop any keyword mapping whose `mapped_canonical_term`
//! isn't a real canonical term before anything is persisted.

use crate::error::{IngestError, Result};
use crate::job::StageId;
use crate::pipeline::{StageContext, StageHandler, StageMetrics, StageOutcome, WorkingSet};
use archivist_ai::AiGateway;
use archivist_store::Store;
use archivist_taxonomy::TaxonomyEngine;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

pub struct AnalyzeStage {
    ai: Arc<AiGateway>,
    taxonomy: Arc<TaxonomyEngine>,
    store: Arc<dyn Store>,
    prompt_template: String,
}

impl AnalyzeStage {
    pub fn new(ai: Arc<AiGateway>, taxonomy: Arc<TaxonomyEngine>, store: Arc<dyn Store>, prompt_template: String) -> Self {
        Self { ai, taxonomy, store, prompt_template }
    }
}

#[async_trait]
impl StageHandler for AnalyzeStage {
    fn stage_id(&self) -> StageId {
        StageId::Analyze
    }

    async fn execute(&self, ctx: &StageContext, working: &mut WorkingSet) -> Result<StageOutcome> {
        let start = Instant::now();
        let text = working
            .extracted_text
            .clone()
            .ok_or_else(|| IngestError::Extraction("no extracted_text on working set".into()))?;

        let snapshot = self.taxonomy.snapshot().await;
        let outcome = self.ai.analyze(&text, &self.prompt_template, &snapshot).await?;

        let validated = self.taxonomy.validate_mapping(&outcome.analysis.keyword_mappings).await;
        let mut analysis = outcome.analysis;
        analysis.keyword_mappings = validated.valid;

        let mut term_ids = Vec::with_capacity(analysis.keyword_mappings.len());
        for mapping in &analysis.keyword_mappings {
            let Some(canonical) = &mapping.mapped_canonical_term else {
                continue;
            };
            if let Some(term) = self.store.find_term_by_name(canonical).await? {
                term_ids.push(term.id);
            }
        }
        term_ids.sort_unstable();
        term_ids.dedup();

        let keywords: Vec<String> = analysis.keyword_mappings.iter().map(|m| m.verbatim_term.clone()).collect();
        let metadata = serde_json::json!({ "document_type": analysis.document_type, "campaign_type": analysis.campaign_type });

        self.store
            .update_content(ctx.doc_id, &text, &analysis, &keywords, metadata.clone(), None)
            .await?;
        self.store.set_document_terms(ctx.doc_id, &term_ids).await?;

        let checkpoint_data = serde_json::to_vec(&analysis).map_err(IngestError::serialization)?;
        let bytes_processed = checkpoint_data.len();

        working.analysis = Some(analysis);
        working.keywords = Some(keywords);
        working.metadata = Some(metadata);

        Ok(StageOutcome {
            checkpoint_data,
            metrics: StageMetrics { duration_ms: start.elapsed().as_millis() as u64, bytes_processed },
        })
    }
}
