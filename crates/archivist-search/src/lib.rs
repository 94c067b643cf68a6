//! Hybrid search: query classification, per-class weighting, component
//! scoring, result/facet caching, and search analytics.

pub mod cache_key;
pub mod classify;
pub mod engine;
pub mod error;
pub mod request;
pub mod score;
pub mod weights;

pub use classify::{classify, QueryClass};
pub use engine::SearchEngine;
pub use error::{Result, SearchError};
pub use request::{FacetCounts, Pagination, SearchHit, SearchRequest, SearchResponse};
pub use weights::Weights;
