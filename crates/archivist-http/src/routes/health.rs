//! `GET /health` and `GET /health/session`.

use crate::state::SharedState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

#[derive(Debug, Serialize)]
pub struct SessionHealthResponse {
    pub status: &'static str,
    pub backend_up: bool,
    pub encryption_ok: bool,
    pub fallback: bool,
}

/// Session diagnostics: `status=error` with
/// `fallback=true` once the Cache/Broker is unreachable and the Session
/// Core has swapped onto its in-memory backend.
pub async fn session_health(State(state): State<SharedState>) -> Json<SessionHealthResponse> {
    let health = state.session.health().await;
    let ok = health.backend_up && health.encryption_ok;
    Json(SessionHealthResponse {
        status: if ok { "ok" } else { "error" },
        backend_up: health.backend_up,
        encryption_ok: health.encryption_ok,
        fallback: health.using_fallback,
    })
}
