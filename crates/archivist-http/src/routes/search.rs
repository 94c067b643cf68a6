//! `GET /documents/search` and `GET /search/top-queries`.

use crate::error::ApiError;
use crate::state::SharedState;
use archivist_core::model::{SortDirection, SortKey};
use archivist_search::SearchRequest;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchQueryParams {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort_by: Option<SortKey>,
    pub sort_direction: Option<SortDirection>,
    pub canonical_term: Option<String>,
    pub primary_category: Option<String>,
}

/// `GET /documents/search`: returns the result envelope
/// described in §4.7 — hybrid-scored documents, pagination, and
/// page-1-only facets.
pub async fn search(
    State(state): State<SharedState>,
    Query(params): Query<SearchQueryParams>,
) -> Result<Json<archivist_search::SearchResponse>, ApiError> {
    let request = SearchRequest {
        q: params.q.filter(|s| !s.trim().is_empty()),
        canonical_term: params.canonical_term,
        primary_category: params.primary_category,
        sort_by: params.sort_by.unwrap_or(SortKey::Relevance),
        sort_direction: params.sort_direction.unwrap_or(SortDirection::Desc),
        page: params.page.unwrap_or(1),
        per_page: params.per_page.unwrap_or(12),
        actor_id: None,
    };

    let response = state.search.search(request).await.map_err(archivist_core::AppError::from)?;
    Ok(Json(response))
}

#[derive(Debug, serde::Serialize)]
pub struct TopQueriesResponse {
    pub queries: Vec<TopQuery>,
}

#[derive(Debug, serde::Serialize)]
pub struct TopQuery {
    pub query_text: String,
    pub count: u64,
}

/// `GET /search/top-queries`: top 10 queries by 7-day count.
pub async fn top_queries(State(state): State<SharedState>) -> Result<Json<TopQueriesResponse>, ApiError> {
    let rows = state.search.top_queries(10).await.map_err(archivist_core::AppError::from)?;
    Ok(Json(TopQueriesResponse {
        queries: rows.into_iter().map(|(query_text, count)| TopQuery { query_text, count }).collect(),
    }))
}
