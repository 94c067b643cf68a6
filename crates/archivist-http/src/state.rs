//! Shared application state handed to every handler via `axum::State`
//!.

use archivist_ai::AiGateway;
use archivist_blob::BlobStore;
use archivist_cache::CacheBroker;
use archivist_core::config::Settings;
use archivist_ingest::Enqueuer;
use archivist_search::SearchEngine;
use archivist_session::SessionCore;
use archivist_store::Store;
use archivist_taxonomy::TaxonomyEngine;
use std::sync::Arc;
use std::time::Instant;

use crate::rate_limit::RateLimiter;

pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn CacheBroker>,
    pub blob: Arc<dyn BlobStore>,
    pub taxonomy: Arc<TaxonomyEngine>,
    pub ai: Arc<AiGateway>,
    pub search: Arc<SearchEngine>,
    pub session: Arc<SessionCore>,
    pub enqueuer: Arc<Enqueuer>,
    pub login_limiter: RateLimiter,
    pub start_time: Instant,
}

/// The type every handler's `State<...>` extractor is generic over.
pub type SharedState = Arc<AppState>;
