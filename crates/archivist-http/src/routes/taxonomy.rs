//! `/taxonomy/*` read endpoints. All public, read-only.

use crate::state::SharedState;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

pub async fn hierarchy(State(state): State<SharedState>) -> Json<HashMap<String, HashMap<String, Vec<String>>>> {
    Json(state.taxonomy.hierarchy().await)
}

pub async fn categories(State(state): State<SharedState>) -> Json<Vec<String>> {
    let snapshot = state.taxonomy.snapshot().await;
    let mut categories: Vec<String> = snapshot.primary_categories().into_iter().collect();
    categories.sort();
    Json(categories)
}

pub async fn canonical_terms(State(state): State<SharedState>) -> Json<HashSet<String>> {
    Json(state.taxonomy.canonical_terms().await)
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<u32>,
}

pub async fn search(State(state): State<SharedState>, Query(params): Query<SearchParams>) -> Json<Vec<String>> {
    let needle = params.q.unwrap_or_default();
    let limit = params.limit.unwrap_or(20);
    Json(state.taxonomy.search(&needle, limit).await)
}
