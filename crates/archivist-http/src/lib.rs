//! HTTP Surface: upload, search, document read,
//! health, reprocess, taxonomy, and auth endpoints, wired over
//! `AppState` and the session middleware the rest of this crate defines.
//! Boundary contracts only — templates, CORS, and rate-limit *tuning*
//! live outside this crate's scope.

pub mod cookie;
pub mod error;
pub mod rate_limit;
pub mod routes;
pub mod session_mw;
pub mod state;
pub mod validate;

pub use error::ApiError;
pub use state::{AppState, SharedState};

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the full router, with the session middleware
/// applied to every route so `Authenticated` can be extracted on the
/// protected ones. CORS policy tuning and any reverse-proxy concerns are
/// the operator's responsibility; this crate
/// only installs a permissive default so local/dev clients work.
pub fn build_router(state: SharedState) -> Router {
    let max_body = state.settings.max_file_size_bytes as usize;

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/health/session", get(routes::health::session_health))
        .route("/documents/upload", post(routes::upload::upload))
        .route("/documents/search", get(routes::search::search))
        .route("/documents/:id", get(routes::documents::get_document))
        .route("/documents/:id/download", get(routes::documents::download))
        .route("/documents/:id/preview", get(routes::documents::preview))
        .route("/documents/:id/status", get(routes::documents::status))
        .route("/documents/:id/reprocess", post(routes::documents::reprocess))
        .route("/taxonomy/hierarchy", get(routes::taxonomy::hierarchy))
        .route("/taxonomy/categories", get(routes::taxonomy::categories))
        .route("/taxonomy/canonical-terms", get(routes::taxonomy::canonical_terms))
        .route("/taxonomy/search", get(routes::taxonomy::search))
        .route("/search/top-queries", get(routes::search::top_queries))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .layer(DefaultBodyLimit::max(max_body.max(1)))
        .layer(middleware::from_fn_with_state(state.clone(), session_mw::session_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
