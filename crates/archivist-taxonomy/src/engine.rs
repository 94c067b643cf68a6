//! The Taxonomy Engine: loads the hierarchy, resolves
//! verbatim terms to canonical ones, and validates AI-emitted keyword
//! mappings. Read-mostly; mutations only via [`TaxonomyEngine::initialize`]
//! and [`TaxonomyEngine::find_or_create`], with readers tolerating eventual consistency of the snapshot.

use crate::error::Result;
use crate::resolve;
use crate::snapshot::TaxonomySnapshot;
use crate::source::TaxonomySourceRow;
use archivist_core::model::{KeywordMapping, TaxonomyTerm};
use archivist_store::{Store, TaxonomyUpsert, TaxonomyUpsertCounts};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// `statistics()` result.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct TaxonomyStatistics {
    pub total_terms: u64,
    pub total_synonyms: u64,
    pub primary_categories: u64,
}

/// `validate_mapping` result: the mappings that survive
/// and those dropped because their `mapped_canonical_term` is unknown.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub valid: Vec<KeywordMapping>,
    pub rejected: Vec<KeywordMapping>,
}

pub struct TaxonomyEngine {
    store: Arc<dyn Store>,
    snapshot: RwLock<TaxonomySnapshot>,
}

impl TaxonomyEngine {
    /// Builds an engine with an empty snapshot; call [`Self::refresh`]
    /// (or [`Self::initialize`]) before serving reads.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(TaxonomySnapshot::default()),
        }
    }

    /// Reloads the in-memory snapshot from the Store. Called on a 5-minute
    /// timer by the caller or immediately after a mutation.
    pub async fn refresh(&self) -> Result<()> {
        let terms = self.store.list_terms().await?;
        let synonyms = self.store.list_synonyms().await?;
        *self.snapshot.write().await = TaxonomySnapshot::build(terms, synonyms);
        Ok(())
    }

    /// Loads a hierarchy from a tabular source; idempotent.
    pub async fn initialize(&self, rows: &[TaxonomySourceRow]) -> Result<TaxonomyUpsertCounts> {
        let upserts: Vec<TaxonomyUpsert> = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| TaxonomyUpsert {
                term: TaxonomyTerm {
                    id: -(idx as i64) - 1,
                    term: row.term.clone(),
                    primary_category: row.primary_category.clone(),
                    subcategory: row.subcategory.clone(),
                    description: None,
                    parent_id: None,
                },
                synonyms: row.synonyms.clone(),
            })
            .collect();

        let counts = self.store.taxonomy_bulk_upsert(&upserts).await?;
        self.refresh().await?;
        tracing::info!(
            terms_created = counts.terms_created,
            terms_updated = counts.terms_updated,
            synonyms_created = counts.synonyms_created,
            "taxonomy initialized"
        );
        Ok(counts)
    }

    pub async fn hierarchy(&self) -> HashMap<String, HashMap<String, Vec<String>>> {
        self.snapshot.read().await.hierarchy()
    }

    pub async fn canonical_terms(&self) -> std::collections::HashSet<String> {
        self.snapshot.read().await.canonical_terms()
    }

    /// A cloned point-in-time view, for callers (the AI Gateway's prompt
    /// renderer) that need an owned `TaxonomySnapshot` rather than going
    /// through the engine's per-call accessors.
    pub async fn snapshot(&self) -> TaxonomySnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn search(&self, prefix_or_substring: &str, limit: u32) -> Vec<String> {
        self.snapshot.read().await.search(prefix_or_substring, limit)
    }

    /// Match order: exact canonical, exact synonym, normalized equality,
    /// then fuzzy edit-distance ≤2 if a single candidate exists.
    pub async fn resolve(&self, verbatim: &str) -> Option<String> {
        resolve::resolve(&self.snapshot.read().await, verbatim)
    }

    /// Drops mappings whose `mapped_canonical_term` is not a known
    /// canonical term; logs what was dropped.
    pub async fn validate_mapping(&self, mappings: &[KeywordMapping]) -> ValidationOutcome {
        let known = self.canonical_terms().await;
        let (valid, rejected) = archivist_core::model::validate_keyword_mappings(mappings, &known);
        for r in &rejected {
            tracing::warn!(
                verbatim = %r.verbatim_term,
                mapped = ?r.mapped_canonical_term,
                "rejected keyword mapping: not a known canonical term"
            );
        }
        ValidationOutcome { valid, rejected }
    }

    /// Atomic upsert of a single term.
    pub async fn find_or_create(
        &self,
        term: &str,
        primary_category: Option<&str>,
        subcategory: Option<&str>,
    ) -> Result<TaxonomyTerm> {
        if let Some(existing) = self.store.find_term_by_name(term).await? {
            return Ok(existing);
        }
        let upsert = TaxonomyUpsert {
            term: TaxonomyTerm {
                id: -1,
                term: term.to_string(),
                primary_category: primary_category.map(str::to_string),
                subcategory: subcategory.map(str::to_string),
                description: None,
                parent_id: None,
            },
            synonyms: Vec::new(),
        };
        self.store.taxonomy_bulk_upsert(&[upsert]).await?;
        self.refresh().await?;
        self.store
            .find_term_by_name(term)
            .await?
            .ok_or_else(|| crate::error::TaxonomyError::UnknownTerm(term.to_string()))
    }

    pub async fn statistics(&self) -> TaxonomyStatistics {
        let snapshot = self.snapshot.read().await;
        TaxonomyStatistics {
            total_terms: snapshot.terms.len() as u64,
            total_synonyms: snapshot.synonyms.len() as u64,
            primary_categories: snapshot.primary_categories().len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_store::MemStore;

    fn sample_rows() -> Vec<TaxonomySourceRow> {
        vec![
            TaxonomySourceRow::new("Healthcare Policy")
                .with_category("Healthcare", "Policy")
                .with_synonyms(["health policy".to_string()]),
            TaxonomySourceRow::new("Cybersecurity").with_category("Technology", "Security"),
        ]
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let engine = TaxonomyEngine::new(Arc::new(MemStore::new()));
        engine.initialize(&sample_rows()).await.unwrap();
        let stats_first = engine.statistics().await;

        engine.initialize(&sample_rows()).await.unwrap();
        let stats_second = engine.statistics().await;

        assert_eq!(stats_first.total_terms, stats_second.total_terms);
        assert_eq!(stats_first.total_synonyms, stats_second.total_synonyms);
        assert_eq!(stats_second.total_terms, 2);
    }

    #[tokio::test]
    async fn hierarchy_groups_by_primary_then_subcategory() {
        let engine = TaxonomyEngine::new(Arc::new(MemStore::new()));
        engine.initialize(&sample_rows()).await.unwrap();
        let hierarchy = engine.hierarchy().await;
        assert!(hierarchy["Healthcare"]["Policy"].contains(&"Healthcare Policy".to_string()));
        assert!(hierarchy["Technology"]["Security"].contains(&"Cybersecurity".to_string()));
    }

    #[tokio::test]
    async fn resolve_uses_synonym_after_initialize() {
        let engine = TaxonomyEngine::new(Arc::new(MemStore::new()));
        engine.initialize(&sample_rows()).await.unwrap();
        assert_eq!(engine.resolve("health policy").await, Some("Healthcare Policy".into()));
    }

    #[tokio::test]
    async fn validate_mapping_drops_unknown_terms_and_keeps_known() {
        let engine = TaxonomyEngine::new(Arc::new(MemStore::new()));
        engine.initialize(&sample_rows()).await.unwrap();

        let mappings = vec![
            KeywordMapping {
                verbatim_term: "healthcare policy".into(),
                mapped_canonical_term: Some("Healthcare Policy".into()),
            },
            KeywordMapping {
                verbatim_term: "bogus".into(),
                mapped_canonical_term: Some("Not A Real Term".into()),
            },
        ];
        let outcome = engine.validate_mapping(&mappings).await;
        assert_eq!(outcome.valid.len(), 1);
        assert_eq!(outcome.rejected.len(), 1);
    }

    #[tokio::test]
    async fn find_or_create_is_atomic_upsert() {
        let engine = TaxonomyEngine::new(Arc::new(MemStore::new()));
        let first = engine.find_or_create("New Term", Some("Cat"), None).await.unwrap();
        let second = engine.find_or_create("New Term", Some("Cat"), None).await.unwrap();
        assert_eq!(first.id, second.id);
    }
}
