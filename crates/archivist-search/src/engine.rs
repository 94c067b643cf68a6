//! `SearchEngine`: ties query classification, the weight
//! table, component scoring, the search/facet caches, and analytics
//! logging together. Calls `archivist-store` for the two candidate sets
//! and `archivist-taxonomy` for taxonomy scoring, matching the teacher's
//! layering of pure orchestration logic over a separate data-access crate
//! (`codegraph-orchestration` over `codegraph-storage`/`codegraph-ir`).

use crate::cache_key;
use crate::classify::{classify, QueryClass};
use crate::error::Result;
use crate::request::{FacetCounts, Pagination, SearchHit, SearchRequest, SearchResponse};
use crate::score;
use crate::weights::Weights;
use archivist_cache::{keys, CacheBroker};
use archivist_core::config::Settings;
use archivist_core::model::{Document, DocumentFilter};
use archivist_store::{Page, Store};
use archivist_taxonomy::TaxonomyEngine;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Union top-K from each candidate source before fusion.
const CANDIDATE_K: u32 = 100;

pub struct SearchEngine {
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheBroker>,
    taxonomy: Arc<TaxonomyEngine>,
    ai: Arc<archivist_ai::AiGateway>,
    settings: Arc<Settings>,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn CacheBroker>, taxonomy: Arc<TaxonomyEngine>, ai: Arc<archivist_ai::AiGateway>, settings: Arc<Settings>) -> Self {
        Self { store, cache, taxonomy, ai, settings }
    }

    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let request = request.normalized();
        let normalized_q = request.q.as_deref().map(archivist_taxonomy::normalize).unwrap_or_default();
        let key = cache_key::compute(&normalized_q, &request);

        if let Some(cached) = self.cache.get(&keys::search(&key)).await? {
            if let Ok(response) = serde_json::from_slice::<SearchResponse>(&cached) {
                return Ok(response);
            }
        }

        let response = self.search_uncached(&request, &normalized_q).await?;

        let ttl = Duration::from_secs(self.settings.search_cache_ttl_s);
        if let Ok(bytes) = serde_json::to_vec(&response) {
            let _ = self.cache.set(&keys::search(&key), &bytes, ttl).await;
        }

        if !normalized_q.is_empty() {
            let _ = self.store.log_search_query(&normalized_q, request.actor_id.as_deref()).await;
        }

        Ok(response)
    }

    async fn search_uncached(&self, request: &SearchRequest, normalized_q: &str) -> Result<SearchResponse> {
        let primary_categories = self.taxonomy.snapshot().await.primary_categories();
        let class = if self.settings.use_enhanced_relevance {
            classify(normalized_q, &primary_categories)
        } else {
            QueryClass::General
        };

        let mut weights = if self.settings.use_enhanced_relevance { Weights::for_class(class) } else { Weights::legacy() };
        if self.settings.use_enhanced_relevance && request.is_filtered() {
            weights = weights.apply_filtered();
        }

        let filter = DocumentFilter {
            status: None,
            canonical_term: request.canonical_term.clone(),
            primary_category: request.primary_category.clone(),
            free_text: request.q.clone(),
        };

        let (vector_scores, text_scores, candidate_ids) = self.gather_candidates(request, normalized_q, &filter).await?;
        let max_text_rank = text_scores.values().cloned().fold(0.0_f32, f32::max);

        let mut hits = Vec::with_capacity(candidate_ids.len());
        let now = Utc::now();
        for id in candidate_ids {
            let Ok(document) = self.store.get(id).await else { continue };
            if !passes_primary_category_filter(&document, request.primary_category.as_deref(), &self.store).await {
                continue;
            }

            let term_ids = self.store.document_term_ids(document.id).await.unwrap_or_default();
            let mut term_names = HashSet::new();
            let mut term_primaries = HashSet::new();
            for term_id in &term_ids {
                if let Ok(term) = self.store.get_term(*term_id).await {
                    term_names.insert(term.term);
                    if let Some(p) = term.primary_category {
                        term_primaries.insert(p);
                    }
                }
            }
            let has_keyword_mappings = document.ai_analysis.as_ref().is_some_and(|a| !a.keyword_mappings.is_empty());

            let vector_component = score::vector_score(vector_scores.get(&id).copied());
            let text_component = score::text_score(text_scores.get(&id).copied(), max_text_rank);
            let taxonomy_component = score::taxonomy_score(
                &term_names,
                &term_primaries,
                has_keyword_mappings,
                request.q.as_deref(),
                request.canonical_term.as_deref(),
                request.primary_category.as_deref(),
            );
            let quality_component = score::quality_score(&document, has_keyword_mappings);
            let freshness_component = score::freshness_score(document.created_at, now);
            let popularity_component = score::popularity_score(quality_component, term_ids.len());

            let relevance_score = weights.vector * vector_component
                + weights.text * text_component
                + weights.taxonomy * taxonomy_component
                + weights.quality * quality_component
                + weights.freshness * freshness_component
                + weights.popularity * popularity_component;

            hits.push(SearchHit { document, relevance_score });
        }

        // Tie-break: score desc, then (created_at desc, id asc).
        hits.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.document.created_at.cmp(&a.document.created_at))
                .then_with(|| a.document.id.cmp(&b.document.id))
        });

        let total = hits.len() as u64;
        let offset = Page { page: request.page, per_page: request.per_page }.offset() as usize;
        let page_rows: Vec<SearchHit> = hits.into_iter().skip(offset).take(request.per_page as usize).collect();
        let has_next = (offset as u64 + page_rows.len() as u64) < total;

        let facets = if request.page == 1 { Some(self.facets().await?) } else { None };

        Ok(SearchResponse {
            documents: page_rows,
            pagination: Pagination { page: request.page, per_page: request.per_page, total, has_next },
            total_count: total,
            facets,
        })
    }

    /// Candidate ids from the union of vector and full-text top-K, plus
    /// their raw component scores, keyed by document id. An empty query skips both and falls back to
    /// `Store::query_documents` so `empty`-class queries (pure
    /// quality/freshness/popularity ranking) still return a candidate set.
    async fn gather_candidates(
        &self,
        request: &SearchRequest,
        normalized_q: &str,
        filter: &DocumentFilter,
    ) -> Result<(HashMap<i64, f32>, HashMap<i64, f32>, Vec<i64>)> {
        let mut vector_scores = HashMap::new();
        let mut text_scores = HashMap::new();
        let mut ids: Vec<i64> = Vec::new();
        let mut seen = HashSet::new();

        if !normalized_q.is_empty() {
            if let Ok(query_vec) = self.ai.embed(normalized_q, self.settings.vector_dim).await {
                if let Ok(hits) = self.store.vector_search(&query_vec, CANDIDATE_K, filter).await {
                    for hit in hits {
                        vector_scores.insert(hit.document_id, hit.score);
                        if seen.insert(hit.document_id) {
                            ids.push(hit.document_id);
                        }
                    }
                }
            }

            if let Ok(hits) = self.store.fulltext_search(&request.q.clone().unwrap_or_default(), filter).await {
                for hit in hits {
                    text_scores.insert(hit.document_id, hit.score);
                    if seen.insert(hit.document_id) {
                        ids.push(hit.document_id);
                    }
                }
            }
        } else {
            let page = Page { page: 1, per_page: 200 };
            let result = self.store.query_documents(filter, request.sort_by, request.sort_direction, page).await?;
            for doc in result.rows {
                if seen.insert(doc.id) {
                    ids.push(doc.id);
                }
            }
        }

        Ok((vector_scores, text_scores, ids))
    }

    /// Computed from the unfiltered current corpus and cached 24h under
    /// `facets:enhanced:all`. Returned on page 1 only.
    async fn facets(&self) -> Result<FacetCounts> {
        if let Some(cached) = self.cache.get(keys::FACETS_ENHANCED_ALL).await? {
            if let Ok(facets) = serde_json::from_slice::<FacetCounts>(&cached) {
                return Ok(facets);
            }
        }

        let empty_filter = DocumentFilter::default();
        let probe = self.store.query_documents(&empty_filter, archivist_core::model::SortKey::CreatedAt, archivist_core::model::SortDirection::Desc, Page { page: 1, per_page: 1 }).await?;
        let all = self
            .store
            .query_documents(&empty_filter, archivist_core::model::SortKey::CreatedAt, archivist_core::model::SortDirection::Desc, Page { page: 1, per_page: probe.total.max(1) as u32 })
            .await?;

        let snapshot = self.taxonomy.snapshot().await;
        let mut facets = FacetCounts::default();
        for doc in all.rows {
            let term_ids = self.store.document_term_ids(doc.id).await.unwrap_or_default();
            let mut primary_categories = HashSet::new();
            let mut subcategories = HashSet::new();
            for term_id in term_ids {
                if let Some(term) = snapshot.term_by_id(term_id) {
                    if let Some(primary) = &term.primary_category {
                        primary_categories.insert(primary.clone());
                    }
                    if let Some(sub) = &term.subcategory {
                        subcategories.insert(sub.clone());
                    }
                }
            }
            // Count once per document per dimension value, even when a
            // document maps to multiple terms sharing a category.
            for primary in primary_categories {
                *facets.primary_category.entry(primary).or_insert(0) += 1;
            }
            for sub in subcategories {
                *facets.subcategory.entry(sub).or_insert(0) += 1;
            }
        }

        let ttl = Duration::from_secs(self.settings.facet_cache_ttl_s);
        if let Ok(bytes) = serde_json::to_vec(&facets) {
            let _ = self.cache.set(keys::FACETS_ENHANCED_ALL, &bytes, ttl).await;
        }
        Ok(facets)
    }

    /// Top-N queries by count in the last 7 days.
    pub async fn top_queries(&self, limit: u32) -> Result<Vec<(String, u64)>> {
        Ok(self.store.top_queries(limit, 7).await?)
    }
}

/// `DocumentFilter::primary_category` has no brute-force equivalent in
/// `MemStore::matches_filter`, so the engine re-checks it post-hydration
/// against the document's mapped taxonomy terms rather than relying on
/// the Store to have applied it already.
async fn passes_primary_category_filter(document: &Document, primary_category: Option<&str>, store: &Arc<dyn Store>) -> bool {
    let Some(wanted) = primary_category else { return true };
    let term_ids = store.document_term_ids(document.id).await.unwrap_or_default();
    for term_id in term_ids {
        if let Ok(term) = store.get_term(term_id).await {
            if term.primary_category.as_deref().is_some_and(|p| p.eq_ignore_ascii_case(wanted)) {
                return true;
            }
        }
    }
    false
}
