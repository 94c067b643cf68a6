//! A stable hash of `{normalized_q, filters, sort_by, sort_direction,
//! page, per_page}`, used as the `search:`
//! cache key.

use crate::request::SearchRequest;
use archivist_core::model::{SortDirection, SortKey};
use sha2::{Digest, Sha256};

fn sort_key_str(key: SortKey) -> &'static str {
    match key {
        SortKey::Relevance => "relevance",
        SortKey::CreatedAt => "created_at",
        SortKey::Filename => "filename",
        SortKey::Size => "size",
    }
}

fn sort_direction_str(dir: SortDirection) -> &'static str {
    match dir {
        SortDirection::Asc => "asc",
        SortDirection::Desc => "desc",
    }
}

pub fn compute(normalized_q: &str, req: &SearchRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_q.as_bytes());
    hasher.update(b"|");
    hasher.update(req.canonical_term.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(req.primary_category.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"|");
    hasher.update(sort_key_str(req.sort_by).as_bytes());
    hasher.update(b"|");
    hasher.update(sort_direction_str(req.sort_direction).as_bytes());
    hasher.update(b"|");
    hasher.update(req.page.to_le_bytes());
    hasher.update(req.per_page.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_hash_identically() {
        let req = SearchRequest::default();
        assert_eq!(compute("healthcare", &req), compute("healthcare", &req));
    }

    #[test]
    fn different_pages_hash_differently() {
        let req_a = SearchRequest { page: 1, ..SearchRequest::default() };
        let req_b = SearchRequest { page: 2, ..SearchRequest::default() };
        assert_ne!(compute("healthcare", &req_a), compute("healthcare", &req_b));
    }

    #[test]
    fn different_filters_hash_differently() {
        let req_a = SearchRequest::default();
        let req_b = SearchRequest { canonical_term: Some("Healthcare Policy".into()), ..SearchRequest::default() };
        assert_ne!(compute("healthcare", &req_a), compute("healthcare", &req_b));
    }
}
