//! `resolve(verbatim) -> canonical?` match order:
//! 1. exact case-insensitive match against a canonical `term`;
//! 2. exact match against a `synonym`;
//! 3. normalized (lowercased, whitespace-collapsed) equality;
//! 4. fuzzy match with edit-distance ≤2, only if exactly one candidate.
//!
//! `resolve` is deterministic for a given corpus; ties are broken by
//! lexicographic order.

use crate::snapshot::TaxonomySnapshot;
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lowercase and collapse runs of whitespace to a single space.
pub fn normalize(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").to_lowercase()
}

const FUZZY_MAX_DISTANCE: usize = 2;

pub fn resolve(snapshot: &TaxonomySnapshot, verbatim: &str) -> Option<String> {
    if verbatim.trim().is_empty() {
        return None;
    }

    if let Some(term) = snapshot.term_by_exact_name(verbatim) {
        return Some(term.term.clone());
    }

    if let Some(term) = snapshot.term_by_synonym(verbatim) {
        return Some(term.term.clone());
    }

    let normalized = normalize(verbatim);
    if let Some(term) = snapshot.terms.iter().find(|t| normalize(&t.term) == normalized) {
        return Some(term.term.clone());
    }
    if let Some(syn) = snapshot.synonyms.iter().find(|s| normalize(&s.synonym) == normalized) {
        if let Some(term) = snapshot.term_by_id(syn.term_id) {
            return Some(term.term.clone());
        }
    }

    fuzzy_resolve(snapshot, &normalized)
}

/// Step 4: fuzzy match against canonical terms only a single candidate
/// at or under [`FUZZY_MAX_DISTANCE`] resolves; two or more candidates at
/// the same minimal distance is treated as ambiguous and returns `None`.
fn fuzzy_resolve(snapshot: &TaxonomySnapshot, normalized: &str) -> Option<String> {
    let mut candidates: Vec<(&str, usize)> = snapshot
        .terms
        .iter()
        .map(|t| (t.term.as_str(), strsim::levenshtein(&normalize(&t.term), normalized)))
        .filter(|(_, dist)| *dist <= FUZZY_MAX_DISTANCE)
        .collect();

    candidates.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

    let best_distance = candidates.first()?.1;
    let tied: Vec<&str> = candidates.iter().filter(|(_, d)| *d == best_distance).map(|(t, _)| *t).collect();
    if tied.len() == 1 {
        Some(tied[0].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use archivist_core::model::{TaxonomySynonym, TaxonomyTerm};

    fn snapshot() -> TaxonomySnapshot {
        TaxonomySnapshot::build(
            vec![
                TaxonomyTerm {
                    id: 1,
                    term: "Healthcare Policy".into(),
                    primary_category: Some("Healthcare".into()),
                    subcategory: None,
                    description: None,
                    parent_id: None,
                },
                TaxonomyTerm {
                    id: 2,
                    term: "Health Insurance".into(),
                    primary_category: Some("Healthcare".into()),
                    subcategory: None,
                    description: None,
                    parent_id: None,
                },
            ],
            vec![TaxonomySynonym {
                id: 1,
                term_id: 1,
                synonym: "health policy".into(),
            }],
        )
    }

    #[test]
    fn resolves_exact_case_insensitive_match() {
        let snap = snapshot();
        assert_eq!(resolve(&snap, "healthcare policy"), Some("Healthcare Policy".into()));
    }

    #[test]
    fn resolves_via_synonym() {
        let snap = snapshot();
        assert_eq!(resolve(&snap, "Health Policy"), Some("Healthcare Policy".into()));
    }

    #[test]
    fn resolves_via_normalized_whitespace() {
        let snap = snapshot();
        assert_eq!(resolve(&snap, "  healthcare   policy  "), Some("Healthcare Policy".into()));
    }

    #[test]
    fn resolves_via_fuzzy_match_when_unique() {
        let snap = snapshot();
        assert_eq!(resolve(&snap, "Healthcar Policy"), Some("Healthcare Policy".into()));
    }

    #[test]
    fn no_candidate_within_fuzzy_threshold_resolves_to_none() {
        let snap = snapshot();
        assert_eq!(resolve(&snap, "Totally Unrelated Subject Matter"), None);
    }

    #[test]
    fn fuzzy_match_is_none_when_tied_between_two_terms() {
        let snap = TaxonomySnapshot::build(
            vec![
                TaxonomyTerm {
                    id: 1,
                    term: "Healthcare".into(),
                    primary_category: None,
                    subcategory: None,
                    description: None,
                    parent_id: None,
                },
                TaxonomyTerm {
                    id: 2,
                    term: "Healthcore".into(),
                    primary_category: None,
                    subcategory: None,
                    description: None,
                    parent_id: None,
                },
            ],
            vec![],
        );
        // "Healthcbre" is edit-distance 1 from both "Healthcare" and
        // "Healthcore" (same substituted position) — ambiguous, so
        // neither wins.
        assert_eq!(resolve(&snap, "Healthcbre"), None);
    }

    #[test]
    fn empty_verbatim_resolves_to_none() {
        let snap = snapshot();
        assert_eq!(resolve(&snap, "   "), None);
    }
}
