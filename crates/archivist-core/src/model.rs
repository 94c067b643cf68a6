//! Domain models for the document catalog.
//!
//! # Core Principles
//!
//! 1. **Single owner**: a [`Document`] is exclusively owned by the Store;
//!    the Ingestion Pipeline only ever holds a logical lease while its
//!    status is [`DocumentStatus::Processing`].
//! 2. **Derived fields are all-or-nothing at completion**: a document whose
//!    status is [`DocumentStatus::Completed`] always has `extracted_text`,
//!    `ai_analysis`, and `search_vector` populated — see
//!    [`Document::is_complete_and_consistent`].
//! 3. **Taxonomy is a join, not a pointer graph**: [`DocumentTaxonomyMap`] is
//!    a plain many-to-many row; there are no cycles to worry about there,
//!    only in [`TaxonomyTerm::parent_id`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Dimensionality of every stored and queried embedding vector.
///
/// Fixed at 1536 per spec.md §3.1; providers with a different native
/// dimension must project down/up to this before `Store::update_embedding`
/// will accept the vector (see spec.md §9 Open Questions).
pub const VECTOR_DIM: usize = 1536;

/// Lifecycle status of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// Legal next states for `self`, per spec.md §4.6.
    ///
    /// `Completed` and `Failed` may only reach `Queued` again through the
    /// explicit `reset_for_reprocessing` operation, which callers model by
    /// checking `self.allows_reprocess()` rather than calling this method.
    pub fn allowed_transitions(self) -> &'static [DocumentStatus] {
        use DocumentStatus::*;
        match self {
            Pending => &[Queued],
            Queued => &[Processing],
            // `Processing => Processing` covers the progress-only updates a
            // worker issues between steps A-E of a single attempt; it is not a state change, just a monotonic progress
            // bump, but it goes through the same `update_status` call.
            Processing => &[Processing, Completed, Failed, Queued],
            Completed => &[],
            Failed => &[],
        }
    }

    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Whether `reset_for_reprocessing` may act on a document in this state.
    pub fn allows_reprocess(self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

/// A single `(verbatim_term, mapped_canonical_term?)` pair emitted by the
/// AI for a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMapping {
    pub verbatim_term: String,
    pub mapped_canonical_term: Option<String>,
}

/// Structured AI analysis output.
///
/// Unknown/extension fields round-trip through `extra` untouched — search
/// never reads them, but reprocessing and API responses must not drop them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub summary: Option<String>,
    pub document_type: Option<String>,
    pub campaign_type: Option<String>,
    pub document_tone: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub keyword_mappings: Vec<KeywordMapping>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AiAnalysis {
    /// Quality contribution used by the relevance engine:
    /// whether a non-empty `summary` is present.
    pub fn has_summary(&self) -> bool {
        self.summary.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// The central entity of the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    pub blob_key: String,
    pub size_bytes: Option<i64>,

    pub status: DocumentStatus,
    pub progress: i16,
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,

    pub extracted_text: Option<String>,
    pub ai_analysis: Option<AiAnalysis>,
    pub keywords: Vec<String>,
    pub metadata: serde_json::Value,
    pub search_vector: Option<Vec<f32>>,
    pub preview_key: Option<String>,

    /// Free-form actor marker used only by `SearchQuery` analytics joins;
    /// not an ownership or tenancy boundary.
    pub uploaded_by: Option<String>,
}

impl Document {
    /// `full_text_index` is derived by the Store, never stored on this
    /// struct directly: `filename || ' ' || extracted_text`.
    pub fn full_text_index(&self) -> String {
        match &self.extracted_text {
            Some(text) => format!("{} {}", self.filename, text),
            None => self.filename.clone(),
        }
    }

    /// Invariant 1: `status = COMPLETED` implies
    /// `extracted_text`, `ai_analysis`, and a correctly-sized
    /// `search_vector` are all present. A document violating this is
    /// *incomplete* and eligible for reprocessing even though its status
    /// says `COMPLETED`.
    pub fn is_complete_and_consistent(&self) -> bool {
        self.status == DocumentStatus::Completed
            && self.extracted_text.is_some()
            && self.ai_analysis.is_some()
            && self
                .search_vector
                .as_ref()
                .is_some_and(|v| v.len() == VECTOR_DIM)
    }

    /// Invariant 2: `status = FAILED` implies `error` is set.
    pub fn is_failed_consistent(&self) -> bool {
        self.status != DocumentStatus::Failed || self.error.is_some()
    }

    /// Whether this document should be offered up by the sweeper/reprocess
    /// eligibility check: COMPLETED but missing a
    /// derived field, or explicitly FAILED.
    pub fn eligible_for_reprocess(&self) -> bool {
        self.status == DocumentStatus::Failed
            || (self.status == DocumentStatus::Completed && !self.is_complete_and_consistent())
    }
}

/// Canonical term in the controlled vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyTerm {
    pub id: i64,
    pub term: String,
    pub primary_category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
}

/// Alternative spelling/label for a [`TaxonomyTerm`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomySynonym {
    pub id: i64,
    pub term_id: i64,
    pub synonym: String,
}

/// Many-to-many association between a [`Document`] and a [`TaxonomyTerm`]
///. Deleted when either side is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentTaxonomyMap {
    pub document_id: i64,
    pub term_id: i64,
}

/// Append-only analytics record; used only for "top
/// queries" aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub id: i64,
    pub query_text: String,
    pub at: DateTime<Utc>,
    pub actor_id: Option<String>,
}

/// Opaque session envelope. The plaintext payload is
/// never persisted — only `encrypted_payload` is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub encrypted_payload: Vec<u8>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Decrypted session contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionPayload {
    pub user_id: Option<String>,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl SessionPayload {
    /// Whether the Surface should treat the bearer of this payload as
    /// authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.attributes
            .get("auth")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Sort keys accepted by `Store::query_documents` / search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Relevance,
    CreatedAt,
    Filename,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Filter predicate shared by `Store::query_documents` and the search path.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub canonical_term: Option<String>,
    pub primary_category: Option<String>,
    pub free_text: Option<String>,
}

/// Drops mappings whose `mapped_canonical_term` is not in `known_terms`
///, returning the surviving mappings and
/// the rejected ones separately so callers can log what was dropped.
pub fn validate_keyword_mappings(
    mappings: &[KeywordMapping],
    known_terms: &HashSet<String>,
) -> (Vec<KeywordMapping>, Vec<KeywordMapping>) {
    let mut valid = Vec::new();
    let mut rejected = Vec::new();
    for mapping in mappings {
        match &mapping.mapped_canonical_term {
            Some(term) if known_terms.contains(term) => valid.push(mapping.clone()),
            None => valid.push(mapping.clone()),
            Some(_) => rejected.push(mapping.clone()),
        }
    }
    (valid, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_follow_state_machine() {
        assert!(DocumentStatus::Pending.can_transition_to(DocumentStatus::Queued));
        assert!(!DocumentStatus::Pending.can_transition_to(DocumentStatus::Processing));
        assert!(DocumentStatus::Processing.can_transition_to(DocumentStatus::Completed));
        assert!(DocumentStatus::Processing.can_transition_to(DocumentStatus::Failed));
        assert!(!DocumentStatus::Completed.can_transition_to(DocumentStatus::Queued));
        assert!(DocumentStatus::Completed.allows_reprocess());
        assert!(DocumentStatus::Failed.allows_reprocess());
        assert!(!DocumentStatus::Pending.allows_reprocess());
    }

    fn sample_document(status: DocumentStatus) -> Document {
        Document {
            id: 1,
            filename: "report.pdf".into(),
            blob_key: "blobs/abc".into(),
            size_bytes: Some(1024),
            status,
            progress: 0,
            error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            processed_at: None,
            extracted_text: None,
            ai_analysis: None,
            keywords: vec![],
            metadata: serde_json::Value::Null,
            search_vector: None,
            preview_key: None,
            uploaded_by: None,
        }
    }

    #[test]
    fn completed_without_derived_fields_is_inconsistent() {
        let doc = sample_document(DocumentStatus::Completed);
        assert!(!doc.is_complete_and_consistent());
        assert!(doc.eligible_for_reprocess());
    }

    #[test]
    fn completed_with_all_derived_fields_is_consistent() {
        let mut doc = sample_document(DocumentStatus::Completed);
        doc.extracted_text = Some("text".into());
        doc.ai_analysis = Some(AiAnalysis::default());
        doc.search_vector = Some(vec![0.0; VECTOR_DIM]);
        assert!(doc.is_complete_and_consistent());
        assert!(!doc.eligible_for_reprocess());
    }

    #[test]
    fn failed_without_error_violates_invariant() {
        let doc = sample_document(DocumentStatus::Failed);
        assert!(!doc.is_failed_consistent());
    }

    #[test]
    fn validate_keyword_mappings_drops_unknown_terms() {
        let known: HashSet<String> = ["Healthcare Policy".to_string()].into_iter().collect();
        let mappings = vec![
            KeywordMapping {
                verbatim_term: "healthcare policy".into(),
                mapped_canonical_term: Some("Healthcare Policy".into()),
            },
            KeywordMapping {
                verbatim_term: "bogus".into(),
                mapped_canonical_term: Some("Not A Term".into()),
            },
            KeywordMapping {
                verbatim_term: "unmapped".into(),
                mapped_canonical_term: None,
            },
        ];

        let (valid, rejected) = validate_keyword_mappings(&mappings, &known);
        assert_eq!(valid.len(), 2);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].verbatim_term, "bogus");
    }

    #[test]
    fn session_payload_requires_explicit_auth_flag() {
        let mut payload = SessionPayload::default();
        assert!(!payload.is_authenticated());
        payload.attributes.insert("auth".into(), serde_json::Value::Bool(true));
        assert!(payload.is_authenticated());
    }
}
