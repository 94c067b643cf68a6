//! An in-memory, read-mostly view over the taxonomy tables, refreshed
//! every 5 minutes or on explicit invalidation. All query methods on [`TaxonomyEngine`] read
//! through a snapshot rather than hitting the Store per call.

use archivist_core::model::{TaxonomySynonym, TaxonomyTerm};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct TaxonomySnapshot {
    pub terms: Vec<TaxonomyTerm>,
    pub synonyms: Vec<TaxonomySynonym>,
    by_id: HashMap<i64, usize>,
    by_lower_term: HashMap<String, usize>,
    synonyms_by_lower: HashMap<String, usize>,
}

impl TaxonomySnapshot {
    pub fn build(terms: Vec<TaxonomyTerm>, synonyms: Vec<TaxonomySynonym>) -> Self {
        let mut by_id = HashMap::with_capacity(terms.len());
        let mut by_lower_term = HashMap::with_capacity(terms.len());
        for (idx, term) in terms.iter().enumerate() {
            by_id.insert(term.id, idx);
            by_lower_term.insert(term.term.to_lowercase(), idx);
        }
        let mut synonyms_by_lower = HashMap::with_capacity(synonyms.len());
        for (idx, syn) in synonyms.iter().enumerate() {
            synonyms_by_lower.insert(syn.synonym.to_lowercase(), idx);
        }
        Self {
            terms,
            synonyms,
            by_id,
            by_lower_term,
            synonyms_by_lower,
        }
    }

    pub fn term_by_id(&self, id: i64) -> Option<&TaxonomyTerm> {
        self.by_id.get(&id).map(|&idx| &self.terms[idx])
    }

    /// Exact case-insensitive match against a canonical `term` (match
    /// order step 1, spec.md §4.4).
    pub fn term_by_exact_name(&self, name: &str) -> Option<&TaxonomyTerm> {
        self.by_lower_term.get(&name.to_lowercase()).map(|&idx| &self.terms[idx])
    }

    /// Exact match against a `synonym` (match order step 2), resolved to
    /// its owning canonical term.
    pub fn term_by_synonym(&self, synonym: &str) -> Option<&TaxonomyTerm> {
        let syn = self.synonyms_by_lower.get(&synonym.to_lowercase())?;
        self.term_by_id(self.synonyms[*syn].term_id)
    }

    pub fn canonical_terms(&self) -> HashSet<String> {
        self.terms.iter().map(|t| t.term.clone()).collect()
    }

    /// `{primary → {subcategory → [term]}}`.
    pub fn hierarchy(&self) -> HashMap<String, HashMap<String, Vec<String>>> {
        let mut out: HashMap<String, HashMap<String, Vec<String>>> = HashMap::new();
        for term in &self.terms {
            let primary = term.primary_category.clone().unwrap_or_else(|| "Uncategorized".to_string());
            let subcategory = term.subcategory.clone().unwrap_or_else(|| "General".to_string());
            out.entry(primary).or_default().entry(subcategory).or_default().push(term.term.clone());
        }
        for subcats in out.values_mut() {
            for terms in subcats.values_mut() {
                terms.sort();
            }
        }
        out
    }

    pub fn primary_categories(&self) -> HashSet<String> {
        self.terms.iter().filter_map(|t| t.primary_category.clone()).collect()
    }

    /// Case-insensitive prefix-or-substring search over canonical terms,
    /// lexicographically ordered.
    pub fn search(&self, needle: &str, limit: u32) -> Vec<String> {
        let needle = needle.to_lowercase();
        let mut matches: Vec<&str> = self
            .terms
            .iter()
            .filter(|t| t.term.to_lowercase().contains(&needle))
            .map(|t| t.term.as_str())
            .collect();
        matches.sort_unstable();
        matches.into_iter().take(limit as usize).map(str::to_string).collect()
    }
}
