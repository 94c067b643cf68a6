//! Per-document component scoring, each normalized to
//! `[0,1]` before weighting.

use archivist_core::model::Document;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Cosine similarity is already approximately `[-1,1]`; clamp the
/// negative half down to 0 since a negative match carries no positive
/// relevance signal here.
pub fn vector_score(raw_cosine: Option<f32>) -> f64 {
    raw_cosine.map(|c| c.clamp(0.0, 1.0) as f64).unwrap_or(0.0)
}

/// Normalized by the top rank in the candidate set.
pub fn text_score(raw_rank: Option<f32>, max_rank_in_candidate_set: f32) -> f64 {
    match raw_rank {
        Some(rank) if max_rank_in_candidate_set > 0.0 => (rank / max_rank_in_candidate_set).clamp(0.0, 1.0) as f64,
        _ => 0.0,
    }
}

/// 1.0 for an exact canonical-term match to `q` or `canonical_term`, 0.7
/// for a primary-category match, 0.4 for a non-empty keyword-mapping
/// bonus, 0 otherwise.
pub fn taxonomy_score(
    document_term_names: &HashSet<String>,
    document_term_primary_categories: &HashSet<String>,
    has_keyword_mappings: bool,
    q: Option<&str>,
    canonical_term_filter: Option<&str>,
    primary_category_filter: Option<&str>,
) -> f64 {
    let exact_match = |needle: &str| document_term_names.iter().any(|t| t.eq_ignore_ascii_case(needle));

    if q.is_some_and(exact_match) || canonical_term_filter.is_some_and(exact_match) {
        return 1.0;
    }

    let primary_match = |needle: &str| document_term_primary_categories.iter().any(|c| c.eq_ignore_ascii_case(needle));
    if q.is_some_and(primary_match) || primary_category_filter.is_some_and(primary_match) {
        return 0.7;
    }

    if has_keyword_mappings {
        return 0.4;
    }

    0.0
}

/// Piecewise `{0, 0.33, 0.66, 1.0}` by the count of present derived
/// fields among `{extracted_text, ai_analysis.summary, search_vector,
/// non-empty taxonomy mappings}`.
pub fn quality_score(doc: &Document, has_taxonomy_mappings: bool) -> f64 {
    let mut present = 0u8;
    if doc.extracted_text.as_deref().is_some_and(|s| !s.trim().is_empty()) {
        present += 1;
    }
    if doc.ai_analysis.as_ref().is_some_and(|a| a.has_summary()) {
        present += 1;
    }
    if doc.search_vector.is_some() {
        present += 1;
    }
    if has_taxonomy_mappings {
        present += 1;
    }
    match present {
        0 => 0.0,
        1 => 0.33,
        2 => 0.66,
        _ => 1.0,
    }
}

/// `1.0` within 30 days, `0.6` within 90 days, else `0.2`.
pub fn freshness_score(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - created_at).num_days();
    if age_days <= 30 {
        1.0
    } else if age_days <= 90 {
        0.6
    } else {
        0.2
    }
}

/// `min(1.0, quality + 0.1*log1p(mapping_count))`.
pub fn popularity_score(quality: f64, mapping_count: usize) -> f64 {
    (quality + 0.1 * (mapping_count as f64).ln_1p()).min(1.0)
}
