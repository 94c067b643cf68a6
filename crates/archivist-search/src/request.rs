//! Request/response envelope types for the hybrid search path.

use archivist_core::model::{Document, SortDirection, SortKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Query parameters accepted by `GET /documents/search`,
/// after default substitution.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub q: Option<String>,
    pub canonical_term: Option<String>,
    pub primary_category: Option<String>,
    pub sort_by: SortKey,
    pub sort_direction: SortDirection,
    pub page: u32,
    pub per_page: u32,
    pub actor_id: Option<String>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            q: None,
            canonical_term: None,
            primary_category: None,
            sort_by: SortKey::Relevance,
            sort_direction: SortDirection::Desc,
            page: 1,
            per_page: 12,
            actor_id: None,
        }
    }
}

impl SearchRequest {
    /// Clamps `page >= 1` and `per_page` into `[1, 50]`.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.per_page = self.per_page.clamp(1, 50);
        self
    }

    pub fn is_filtered(&self) -> bool {
        self.canonical_term.is_some() || self.primary_category.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub document: Document,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub has_next: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacetCounts {
    pub primary_category: BTreeMap<String, u64>,
    pub subcategory: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub documents: Vec<SearchHit>,
    pub pagination: Pagination,
    pub total_count: u64,
    pub facets: Option<FacetCounts>,
}
