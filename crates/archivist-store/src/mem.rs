//! In-memory [`Store`] test double. Implements the exact same contract as
//! [`crate::PgStore`] — brute-force vector/full-text scoring instead of
//! `pgvector`/`tsvector` — so the rest of the workspace's test suites
//! never need a live Postgres instance.

use crate::error::{Result, StorageError};
use crate::store::{DocumentPage, Page, ScoredHit, Store, TaxonomyUpsert, TaxonomyUpsertCounts};
use archivist_core::model::{
    AiAnalysis, Document, DocumentFilter, DocumentStatus, SortDirection, SortKey, TaxonomySynonym,
    TaxonomyTerm,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    documents: HashMap<i64, Document>,
    terms: HashMap<i64, TaxonomyTerm>,
    synonyms: Vec<TaxonomySynonym>,
    document_terms: HashMap<i64, HashSet<i64>>,
    search_queries: Vec<(String, Option<String>, chrono::DateTime<Utc>)>,
}

pub struct MemStore {
    inner: RwLock<Inner>,
    next_document_id: AtomicI64,
    next_term_id: AtomicI64,
    next_synonym_id: AtomicI64,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_document_id: AtomicI64::new(1),
            next_term_id: AtomicI64::new(1),
            next_synonym_id: AtomicI64::new(1),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn matches_filter(doc: &Document, filter: &DocumentFilter, document_terms: &HashMap<i64, HashSet<i64>>, terms: &HashMap<i64, TaxonomyTerm>) -> bool {
    if let Some(status) = filter.status {
        if doc.status != status {
            return false;
        }
    }
    if let Some(term) = &filter.canonical_term {
        let owned = document_terms.get(&doc.id);
        let has_term = owned.is_some_and(|ids| ids.iter().any(|id| terms.get(id).is_some_and(|t| &t.term == term)));
        if !has_term {
            return false;
        }
    }
    true
}

#[async_trait]
impl Store for MemStore {
    async fn create_document(&self, filename: &str, blob_key: &str, size_bytes: Option<i64>) -> Result<Document> {
        let id = self.next_document_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let doc = Document {
            id,
            filename: filename.to_string(),
            blob_key: blob_key.to_string(),
            size_bytes,
            status: DocumentStatus::Pending,
            progress: 0,
            error: None,
            created_at: now,
            updated_at: now,
            processed_at: None,
            extracted_text: None,
            ai_analysis: None,
            keywords: Vec::new(),
            metadata: serde_json::Value::Object(Default::default()),
            search_vector: None,
            preview_key: None,
            uploaded_by: None,
        };
        self.inner.write().await.documents.insert(id, doc.clone());
        Ok(doc)
    }

    async fn get(&self, id: i64) -> Result<Document> {
        self.inner
            .read()
            .await
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::document_not_found(id))
    }

    async fn update_status(
        &self,
        id: i64,
        status: DocumentStatus,
        progress: Option<i16>,
        error: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let doc = inner.documents.get_mut(&id).ok_or_else(|| StorageError::document_not_found(id))?;
        if !doc.status.can_transition_to(status) {
            return Err(StorageError::invalid_transition(&format!("{:?}", doc.status), &format!("{:?}", status)));
        }
        doc.status = status;
        if let Some(p) = progress {
            doc.progress = p;
        }
        doc.error = error.map(str::to_string);
        doc.updated_at = Utc::now();
        if status == DocumentStatus::Completed {
            doc.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn update_content(
        &self,
        id: i64,
        extracted_text: &str,
        ai_analysis: &AiAnalysis,
        keywords: &[String],
        metadata: serde_json::Value,
        preview_key: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let doc = inner.documents.get_mut(&id).ok_or_else(|| StorageError::document_not_found(id))?;
        doc.extracted_text = Some(extracted_text.to_string());
        doc.ai_analysis = Some(ai_analysis.clone());
        doc.keywords = keywords.to_vec();
        doc.metadata = metadata;
        if let Some(key) = preview_key {
            doc.preview_key = Some(key.to_string());
        }
        doc.updated_at = Utc::now();
        Ok(())
    }

    async fn update_embedding(&self, id: i64, vector: &[f32]) -> Result<()> {
        if vector.len() != archivist_core::model::VECTOR_DIM {
            return Err(StorageError::dimension_mismatch(archivist_core::model::VECTOR_DIM, vector.len()));
        }
        let mut inner = self.inner.write().await;
        let doc = inner.documents.get_mut(&id).ok_or_else(|| StorageError::document_not_found(id))?;
        doc.search_vector = Some(vector.to_vec());
        Ok(())
    }

    async fn reset_for_reprocessing(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        {
            let doc = inner.documents.get_mut(&id).ok_or_else(|| StorageError::document_not_found(id))?;
            doc.extracted_text = None;
            doc.ai_analysis = None;
            doc.keywords.clear();
            doc.search_vector = None;
            doc.status = DocumentStatus::Queued;
            doc.progress = 0;
            doc.error = None;
            doc.updated_at = Utc::now();
        }
        inner.document_terms.remove(&id);
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.documents.remove(&id);
        inner.document_terms.remove(&id);
        Ok(())
    }

    async fn query_documents(
        &self,
        filter: &DocumentFilter,
        sort_by: SortKey,
        sort_direction: SortDirection,
        page: Page,
    ) -> Result<DocumentPage> {
        let inner = self.inner.read().await;
        let mut matching: Vec<Document> = inner
            .documents
            .values()
            .filter(|doc| matches_filter(doc, filter, &inner.document_terms, &inner.terms))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ord = match sort_by {
                SortKey::Relevance | SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
                SortKey::Filename => a.filename.cmp(&b.filename),
                SortKey::Size => a.size_bytes.unwrap_or(0).cmp(&b.size_bytes.unwrap_or(0)),
            };
            match sort_direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });

        let total = matching.len() as u64;
        let offset = page.offset() as usize;
        let rows = matching.into_iter().skip(offset).take(page.per_page as usize).collect();
        Ok(DocumentPage { rows, total })
    }

    async fn vector_search(&self, query_vec: &[f32], k: u32, filter: &DocumentFilter) -> Result<Vec<ScoredHit>> {
        let inner = self.inner.read().await;
        let mut hits: Vec<ScoredHit> = inner
            .documents
            .values()
            .filter(|doc| matches_filter(doc, filter, &inner.document_terms, &inner.terms))
            .filter_map(|doc| {
                doc.search_vector.as_ref().map(|v| ScoredHit {
                    document_id: doc.id,
                    score: cosine_similarity(v, query_vec),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k as usize);
        Ok(hits)
    }

    async fn fulltext_search(&self, query_text: &str, filter: &DocumentFilter) -> Result<Vec<ScoredHit>> {
        let inner = self.inner.read().await;
        let needle = query_text.to_lowercase();
        let mut hits: Vec<ScoredHit> = inner
            .documents
            .values()
            .filter(|doc| matches_filter(doc, filter, &inner.document_terms, &inner.terms))
            .filter_map(|doc| {
                let haystack = doc.full_text_index().to_lowercase();
                let count = haystack.matches(&needle).count();
                if count > 0 {
                    Some(ScoredHit {
                        document_id: doc.id,
                        score: count as f32,
                    })
                } else {
                    None
                }
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(100);
        Ok(hits)
    }

    async fn taxonomy_bulk_upsert(&self, upserts: &[TaxonomyUpsert]) -> Result<TaxonomyUpsertCounts> {
        let mut inner = self.inner.write().await;
        let mut counts = TaxonomyUpsertCounts::default();
        for upsert in upserts {
            let existing_id = inner
                .terms
                .values()
                .find(|t| t.term.eq_ignore_ascii_case(&upsert.term.term))
                .map(|t| t.id);

            let term_id = if let Some(id) = existing_id {
                let term = inner.terms.get_mut(&id).unwrap();
                term.primary_category = upsert.term.primary_category.clone();
                term.subcategory = upsert.term.subcategory.clone();
                term.description = upsert.term.description.clone();
                counts.terms_updated += 1;
                id
            } else {
                let id = self.next_term_id.fetch_add(1, Ordering::SeqCst);
                inner.terms.insert(
                    id,
                    TaxonomyTerm {
                        id,
                        term: upsert.term.term.clone(),
                        primary_category: upsert.term.primary_category.clone(),
                        subcategory: upsert.term.subcategory.clone(),
                        description: upsert.term.description.clone(),
                        parent_id: upsert.term.parent_id,
                    },
                );
                counts.terms_created += 1;
                id
            };

            for synonym in &upsert.synonyms {
                let exists = inner.synonyms.iter().any(|s| s.term_id == term_id && &s.synonym == synonym);
                if !exists {
                    let id = self.next_synonym_id.fetch_add(1, Ordering::SeqCst);
                    inner.synonyms.push(TaxonomySynonym {
                        id,
                        term_id,
                        synonym: synonym.clone(),
                    });
                    counts.synonyms_created += 1;
                }
            }
        }
        Ok(counts)
    }

    async fn get_term(&self, id: i64) -> Result<TaxonomyTerm> {
        self.inner.read().await.terms.get(&id).cloned().ok_or_else(|| StorageError::term_not_found(id.to_string()))
    }

    async fn find_term_by_name(&self, term: &str) -> Result<Option<TaxonomyTerm>> {
        Ok(self.inner.read().await.terms.values().find(|t| t.term.eq_ignore_ascii_case(term)).cloned())
    }

    async fn list_terms(&self) -> Result<Vec<TaxonomyTerm>> {
        let mut terms: Vec<TaxonomyTerm> = self.inner.read().await.terms.values().cloned().collect();
        terms.sort_by(|a, b| a.term.cmp(&b.term));
        Ok(terms)
    }

    async fn list_synonyms(&self) -> Result<Vec<TaxonomySynonym>> {
        Ok(self.inner.read().await.synonyms.clone())
    }

    async fn set_document_terms(&self, document_id: i64, term_ids: &[i64]) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.document_terms.insert(document_id, term_ids.iter().copied().collect());
        Ok(())
    }

    async fn document_term_ids(&self, document_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .inner
            .read()
            .await
            .document_terms
            .get(&document_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn log_search_query(&self, query_text: &str, actor_id: Option<&str>) -> Result<()> {
        self.inner
            .write()
            .await
            .search_queries
            .push((query_text.to_string(), actor_id.map(str::to_string), Utc::now()));
        Ok(())
    }

    async fn top_queries(&self, limit: u32, days: u32) -> Result<Vec<(String, u64)>> {
        let inner = self.inner.read().await;
        let cutoff = Utc::now() - chrono::Duration::days(days as i64);
        let mut counts: HashMap<String, u64> = HashMap::new();
        for (query, _, at) in inner.search_queries.iter() {
            if *at >= cutoff {
                *counts.entry(query.clone()).or_insert(0) += 1;
            }
        }
        let mut rows: Vec<(String, u64)> = counts.into_iter().collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn find_stuck_documents(&self, older_than_s: i64) -> Result<Vec<i64>> {
        let inner = self.inner.read().await;
        let cutoff = Utc::now() - chrono::Duration::seconds(older_than_s);
        Ok(inner
            .documents
            .values()
            .filter(|doc| matches!(doc.status, DocumentStatus::Pending | DocumentStatus::Queued) && doc.updated_at < cutoff)
            .map(|doc| doc.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = MemStore::new();
        let doc = store.create_document("report.pdf", "blobs/abc", Some(1024)).await.unwrap();
        let fetched = store.get(doc.id).await.unwrap();
        assert_eq!(fetched.filename, "report.pdf");
        assert_eq!(fetched.status, DocumentStatus::Pending);
    }

    #[tokio::test]
    async fn update_status_rejects_illegal_transition() {
        let store = MemStore::new();
        let doc = store.create_document("a.pdf", "blobs/a", None).await.unwrap();
        let err = store.update_status(doc.id, DocumentStatus::Processing, None, None).await.unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidTransition);
    }

    #[tokio::test]
    async fn reset_for_reprocessing_clears_derived_fields_and_terms() {
        let store = MemStore::new();
        let doc = store.create_document("a.pdf", "blobs/a", None).await.unwrap();
        store.update_status(doc.id, DocumentStatus::Queued, None, None).await.unwrap();
        store.update_status(doc.id, DocumentStatus::Processing, Some(5), None).await.unwrap();
        store
            .update_content(doc.id, "text", &AiAnalysis::default(), &["kw".into()], serde_json::json!({}), None)
            .await
            .unwrap();
        store.update_embedding(doc.id, &vec![0.0; archivist_core::model::VECTOR_DIM]).await.unwrap();
        store.set_document_terms(doc.id, &[1, 2]).await.unwrap();
        store.update_status(doc.id, DocumentStatus::Completed, Some(100), None).await.unwrap();

        store.reset_for_reprocessing(doc.id).await.unwrap();
        let fetched = store.get(doc.id).await.unwrap();
        assert_eq!(fetched.status, DocumentStatus::Queued);
        assert!(fetched.extracted_text.is_none());
        assert!(fetched.search_vector.is_none());
        assert_eq!(store.document_term_ids(doc.id).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn vector_search_ranks_by_cosine_similarity() {
        let store = MemStore::new();
        let mut dim0 = vec![0.0; archivist_core::model::VECTOR_DIM];
        dim0[0] = 1.0;
        let mut dim1 = vec![0.0; archivist_core::model::VECTOR_DIM];
        dim1[1] = 1.0;

        let a = store.create_document("a.pdf", "blobs/a", None).await.unwrap();
        let b = store.create_document("b.pdf", "blobs/b", None).await.unwrap();
        store.update_embedding(a.id, &dim0).await.unwrap();
        store.update_embedding(b.id, &dim1).await.unwrap();

        let hits = store.vector_search(&dim0, 10, &DocumentFilter::default()).await.unwrap();
        assert_eq!(hits[0].document_id, a.id);
        assert!(hits[0].score > hits[1].score);
    }
}
