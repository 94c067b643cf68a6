//! `POST /login`, `POST /logout`: a single shared password, compared in constant time,
//! rate-limited at 10/minute per source address.

use crate::cookie::{clear_cookie, read_session_id, set_cookie};
use crate::error::ApiError;
use crate::state::SharedState;
use archivist_core::model::SessionPayload;
use archivist_core::AppError;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use subtle::ConstantTimeEq;

const LOGIN_RATE_PER_MINUTE: u32 = 10;
const LOGIN_RATE_BURST: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
}

/// Compares `candidate` against the configured `app_password` in
/// constant time.
fn passwords_match(candidate: &str, configured: &str) -> bool {
    candidate.as_bytes().ct_eq(configured.as_bytes()).into()
}

pub async fn login(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let source = addr.ip().to_string();
    if !state.login_limiter.allow(&source, LOGIN_RATE_PER_MINUTE, LOGIN_RATE_BURST) {
        return Err(ApiError(AppError::RateLimited { retry_after_s: 60 }));
    }

    if !passwords_match(&body.password, &state.settings.app_password) {
        tracing::warn!(source = %source, "login attempt with incorrect password");
        return Err(ApiError(AppError::AuthError("incorrect password".into())));
    }

    let mut payload = SessionPayload::default();
    payload.attributes.insert("auth".into(), serde_json::Value::Bool(true));
    let session_id = state.session.create(&payload).await.map_err(AppError::from)?;

    let mut response = Json(LoginResponse { success: true }).into_response();
    response.headers_mut().insert(axum::http::header::SET_COOKIE, set_cookie(&session_id, &state.settings));
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

pub async fn logout(State(state): State<SharedState>, headers: HeaderMap) -> Result<Response, ApiError> {
    if let Some(session_id) = read_session_id(&headers) {
        state.session.destroy(&session_id).await.map_err(AppError::from)?;
    }

    let mut response = (StatusCode::OK, Json(LogoutResponse { success: true })).into_response();
    response.headers_mut().insert(axum::http::header::SET_COOKIE, clear_cookie(&state.settings));
    Ok(response)
}
