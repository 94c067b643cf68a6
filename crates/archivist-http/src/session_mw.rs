//! Session-loading middleware and the `Authenticated` extractor. Mirrors
//! the teacher's `validate_origin`/`validate_bearer` shape
//! (`AlrikOlson-codescope::server::auth`): an `axum::middleware::from_fn`
//! function that inspects the request, stashes a verdict in extensions,
//! and lets the handler (or a dedicated extractor) decide what to do
//! with it.

use crate::cookie::read_session_id;
use crate::error::ApiError;
use crate::state::SharedState;
use archivist_core::model::SessionPayload;
use archivist_core::AppError;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use async_trait::async_trait;

/// What the session middleware learned about the caller's session,
/// stashed in request extensions for handlers/extractors to read.
#[derive(Clone, Default)]
pub struct SessionContext {
    pub payload: Option<SessionPayload>,
    /// `true` if `SessionCore::load` itself failed (not just "no
    /// session") — distinct from an absent/expired cookie.
    pub backend_error: bool,
}

/// Loads the session (if any), stashes a [`SessionContext`], runs the
/// handler, then stamps `X-Session-Warning` on the response whenever the
/// Session Core is running on its in-memory fallback.
pub async fn session_middleware(State(state): State<SharedState>, mut req: Request, next: Next) -> Response {
    let mut ctx = SessionContext::default();

    if let Some(session_id) = read_session_id(req.headers()) {
        match state.session.load(&session_id).await {
            Ok(payload) => ctx.payload = payload,
            Err(err) => {
                tracing::warn!(error = %err, "session load failed");
                ctx.backend_error = true;
            }
        }
    }

    req.extensions_mut().insert(ctx);

    let using_fallback = state.session.is_using_fallback();
    let mut response = next.run(req).await;
    if using_fallback {
        response.headers_mut().insert("x-session-warning", HeaderValue::from_static("session backend unavailable, using in-memory fallback"));
    }
    response
}

/// Extractor requiring an authenticated session. Used on protected routes (upload,
/// reprocess); rejects with `401` when no valid session is present, or
/// `503` when the session backend itself is down and the operator has
/// not opted into `allow_unauthenticated_on_session_failure`.
pub struct Authenticated(pub SessionPayload);

#[async_trait]
impl FromRequestParts<SharedState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let ctx = parts.extensions.get::<SessionContext>().cloned().unwrap_or_default();

        if ctx.backend_error {
            if state.settings.allow_unauthenticated_on_session_failure {
                tracing::warn!("session backend unavailable; allow_unauthenticated_on_session_failure bypassed auth check");
                return Ok(Authenticated(SessionPayload::default()));
            }
            return Err(ApiError(AppError::Backpressure("session backend unavailable".into())));
        }

        match ctx.payload {
            Some(payload) if payload.is_authenticated() => Ok(Authenticated(payload)),
            _ => Err(ApiError(AppError::AuthError("authentication required".into()))),
        }
    }
}
