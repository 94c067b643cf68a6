//! `/documents/{id}*` endpoints: read, download, preview,
//! status, and reprocess.

use crate::error::ApiError;
use crate::session_mw::Authenticated;
use crate::state::SharedState;
use archivist_core::model::{Document, DocumentStatus};
use archivist_core::AppError;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Serialize;
use std::time::Duration;

const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(300);

/// `GET /documents/{id}`: "full record minus bytes" — the
/// `Document` struct never embeds file bytes itself, so the stored model
/// serializes directly.
pub async fn get_document(State(state): State<SharedState>, Path(id): Path<i64>) -> Result<Json<Document>, ApiError> {
    let document = state.store.get(id).await.map_err(AppError::from)?;
    Ok(Json(document))
}

/// `GET /documents/{id}/download`: redirects to a
/// presigned URL when the blob backend supports one, otherwise streams
/// the bytes directly. Presigned URLs are never persisted — regenerated
/// on every call.
pub async fn download(State(state): State<SharedState>, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let document = state.store.get(id).await.map_err(AppError::from)?;

    if let Some(url) = state.blob.presigned_get(&document.blob_key, DOWNLOAD_URL_TTL).await.map_err(AppError::from)? {
        return Ok(Redirect::to(&url).into_response());
    }

    let stream = state.blob.get(&document.blob_key).await.map_err(AppError::from)?;
    let body = Body::from_stream(stream);
    let content_disposition = format!("attachment; filename=\"{}\"", sanitize_header_value(&document.filename));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_DISPOSITION, content_disposition),
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        ],
        body,
    )
        .into_response())
}

/// Minimal neutral placeholder returned by `/preview` when no preview
/// has been generated yet.
const PLACEHOLDER_SVG: &str = "<svg xmlns='http://www.w3.org/2000/svg' width='200' height='260'><rect width='100%' height='100%' fill='#e2e2e2'/><text x='50%' y='50%' text-anchor='middle' fill='#888'>no preview</text></svg>";

/// `GET /documents/{id}/preview`: streams the
/// Preview-collaborator-generated image when `preview_key` is set,
/// otherwise a static placeholder. Preview rendering itself is out of
/// scope; this only reads whatever `preview_key` the
/// pipeline already wrote.
pub async fn preview(State(state): State<SharedState>, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let document = state.store.get(id).await.map_err(AppError::from)?;

    let Some(preview_key) = document.preview_key else {
        return Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/svg+xml")], PLACEHOLDER_SVG).into_response());
    };

    match state.blob.get(&preview_key).await {
        Ok(stream) => Ok((StatusCode::OK, [(header::CONTENT_TYPE, "application/octet-stream")], Body::from_stream(stream)).into_response()),
        Err(_) => Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/svg+xml")], PLACEHOLDER_SVG).into_response()),
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: DocumentStatus,
    pub progress: i16,
    pub error: Option<String>,
}

/// `GET /documents/{id}/status`.
pub async fn status(State(state): State<SharedState>, Path(id): Path<i64>) -> Result<Json<StatusResponse>, ApiError> {
    let document = state.store.get(id).await.map_err(AppError::from)?;
    Ok(Json(StatusResponse { status: document.status, progress: document.progress, error: document.error }))
}

#[derive(Debug, Serialize)]
pub struct ReprocessResponse {
    pub success: bool,
    pub document_id: i64,
}

/// `POST /documents/{id}/reprocess`.
/// Always protected. Rejects with `409 ConflictingState` while the
/// document is currently `PROCESSING`.
pub async fn reprocess(
    State(state): State<SharedState>,
    _auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<Json<ReprocessResponse>, ApiError> {
    let document = state.store.get(id).await.map_err(AppError::from)?;
    if document.status == DocumentStatus::Processing {
        return Err(ApiError(AppError::ConflictingState(format!(
            "document {id} is currently processing; wait for a terminal state before reprocessing"
        ))));
    }

    // Facet cache is deliberately left alone here — it is only invalidated
    // once the reprocess run actually completes (step E), not on request
    //.
    state.store.reset_for_reprocessing(id).await.map_err(AppError::from)?;
    state.enqueuer.enqueue_existing(id).await.map_err(AppError::from)?;

    Ok(Json(ReprocessResponse { success: true, document_id: id }))
}

fn sanitize_header_value(value: &str) -> String {
    value.chars().filter(|c| !c.is_control() && *c != '"').collect()
}
