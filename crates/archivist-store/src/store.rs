//! The `Store` port: durable persistence of documents,
//! taxonomy, and search analytics. All mutating operations run inside a
//! transaction; read paths may be non-transactional.

use crate::Result;
use archivist_core::model::{
    Document, DocumentFilter, SortDirection, SortKey, TaxonomySynonym, TaxonomyTerm,
};
use async_trait::async_trait;

/// A page of [`Document`] rows plus the total matching the filter, before
/// pagination was applied.
#[derive(Debug, Clone)]
pub struct DocumentPage {
    pub rows: Vec<Document>,
    pub total: u64,
}

/// Pagination parameters shared by `query_documents` and the search path.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn offset(&self) -> u32 {
        (self.page.saturating_sub(1)) * self.per_page
    }
}

/// A bulk upsert unit for `taxonomy_bulk_upsert`: one canonical term plus its synonyms.
#[derive(Debug, Clone)]
pub struct TaxonomyUpsert {
    pub term: TaxonomyTerm,
    pub synonyms: Vec<String>,
}

/// Counts returned by a taxonomy load, mirrored from `TaxonomyEngine::initialize`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaxonomyUpsertCounts {
    pub terms_created: u64,
    pub terms_updated: u64,
    pub synonyms_created: u64,
}

/// A candidate hit from `vector_search` or `fulltext_search`: a document
/// id paired with its raw (unnormalized) component score.
#[derive(Debug, Clone, Copy)]
pub struct ScoredHit {
    pub document_id: i64,
    pub score: f32,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Create a `Document` row with `status=PENDING`, `progress=0`.
    /// Returns the assigned id.
    async fn create_document(&self, filename: &str, blob_key: &str, size_bytes: Option<i64>) -> Result<Document>;

    async fn get(&self, id: i64) -> Result<Document>;

    /// Atomic; rejects a transition not permitted by
    /// [`archivist_core::model::DocumentStatus::allowed_transitions`] with
    /// `ErrorKind::InvalidTransition` and does not mutate state.
    async fn update_status(
        &self,
        id: i64,
        status: archivist_core::model::DocumentStatus,
        progress: Option<i16>,
        error: Option<&str>,
    ) -> Result<()>;

    /// Atomic; re-derives `full_text_index` from `filename || ' ' ||
    /// extracted_text`.
    #[allow(clippy::too_many_arguments)]
    async fn update_content(
        &self,
        id: i64,
        extracted_text: &str,
        ai_analysis: &archivist_core::model::AiAnalysis,
        keywords: &[String],
        metadata: serde_json::Value,
        preview_key: Option<&str>,
    ) -> Result<()>;

    /// `vector.len()` must equal the Store's configured dimension.
    async fn update_embedding(&self, id: i64, vector: &[f32]) -> Result<()>;

    /// Clears `extracted_text`, `ai_analysis`, `keywords`, `search_vector`,
    /// and the taxonomy map; resets `status=QUEUED`, `progress=0`,
    /// `error=None`. Idempotent.
    async fn reset_for_reprocessing(&self, id: i64) -> Result<()>;

    /// Cascades `DocumentTaxonomyMap` entries. Blob/preview deletion is
    /// the caller's responsibility (best-effort, outside this trait).
    async fn delete(&self, id: i64) -> Result<()>;

    async fn query_documents(
        &self,
        filter: &DocumentFilter,
        sort_by: SortKey,
        sort_direction: SortDirection,
        page: Page,
    ) -> Result<DocumentPage>;

    /// Approximate nearest-neighbor search with cosine metric.
    async fn vector_search(&self, query_vec: &[f32], k: u32, filter: &DocumentFilter) -> Result<Vec<ScoredHit>>;

    /// Language-aware tokenization (English stemmer, stopwords).
    async fn fulltext_search(&self, query_text: &str, filter: &DocumentFilter) -> Result<Vec<ScoredHit>>;

    /// Idempotent bulk load of taxonomy terms and synonyms.
    async fn taxonomy_bulk_upsert(&self, upserts: &[TaxonomyUpsert]) -> Result<TaxonomyUpsertCounts>;

    async fn get_term(&self, id: i64) -> Result<TaxonomyTerm>;
    async fn find_term_by_name(&self, term: &str) -> Result<Option<TaxonomyTerm>>;
    async fn list_terms(&self) -> Result<Vec<TaxonomyTerm>>;
    async fn list_synonyms(&self) -> Result<Vec<TaxonomySynonym>>;

    /// Replace the set of `DocumentTaxonomyMap` rows for `document_id`
    /// with `term_ids` (used after analysis/reprocessing).
    async fn set_document_terms(&self, document_id: i64, term_ids: &[i64]) -> Result<()>;
    async fn document_term_ids(&self, document_id: i64) -> Result<Vec<i64>>;

    /// Append-only analytics write. Failure
    /// to log must never fail the caller's query — callers are expected
    /// to swallow the error, not propagate it.
    async fn log_search_query(&self, query_text: &str, actor_id: Option<&str>) -> Result<()>;

    /// Top-N queries by count in the last `days` days.
    async fn top_queries(&self, limit: u32, days: u32) -> Result<Vec<(String, u64)>>;

    /// Documents stuck in `PENDING` or `QUEUED` for longer than
    /// `older_than_s` seconds (used by the ingestion sweeper).
    async fn find_stuck_documents(&self, older_than_s: i64) -> Result<Vec<i64>>;
}
