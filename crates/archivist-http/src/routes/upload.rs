//! `POST /documents/upload`: validates each file, writes
//! its blob, creates a `Document` row, and enqueues a processing job,
//! staggering jobs within one multi-file batch by
//! delaying each subsequent job's visibility rather than blocking the
//! request on a sleep.

use crate::error::ApiError;
use crate::session_mw::Authenticated;
use crate::state::SharedState;
use crate::validate::{validate_extension, validate_filename, validate_size};
use archivist_cache::keys;
use archivist_core::AppError;
use axum::extract::{Multipart, State};
use axum::Json;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct UploadedDocument {
    pub id: i64,
    pub filename: String,
    pub status: archivist_core::model::DocumentStatus,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub documents: Vec<UploadedDocument>,
}

/// Upload endpoint. Always protected:
/// "upload and reprocess are always protected".
pub async fn upload(
    State(state): State<SharedState>,
    _auth: Authenticated,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let depth = state.cache.queue_depth(keys::JOB_QUEUE_DOCUMENTS_PROCESS).await.map_err(AppError::from)?;
    if depth >= state.settings.queue_depth_watermark {
        return Err(ApiError(AppError::Backpressure(format!(
            "job queue depth {depth} at or above watermark {}",
            state.settings.queue_depth_watermark
        ))));
    }

    let mut uploaded = Vec::new();
    let mut batch_index: i64 = 0;
    let now = Utc::now();

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError(AppError::validation(e)))? {
        if field.name() != Some("files[]") && field.name() != Some("files") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        validate_filename(&filename)?;
        validate_extension(&filename)?;

        let bytes = field.bytes().await.map_err(|e| ApiError(AppError::validation(e)))?;
        validate_size(bytes.len() as u64, state.settings.max_file_size_bytes)?;
        if bytes.is_empty() {
            return Err(ApiError(AppError::ValidationError(format!("{filename}: file is empty"))));
        }

        let blob_key = archivist_blob::generate_key(&filename);
        let content_type = infer_content_type(&filename);
        state.blob.put(&blob_key, bytes.to_vec(), &content_type).await.map_err(AppError::from)?;

        let eta = if batch_index == 0 {
            None
        } else {
            Some(now + ChronoDuration::seconds(state.settings.upload_batch_stagger_s as i64 * batch_index))
        };

        let document = state
            .enqueuer
            .enqueue_upload_with_eta(&filename, &blob_key, Some(bytes.len() as i64), eta)
            .await
            .map_err(AppError::from)?;

        uploaded.push(UploadedDocument { id: document.id, filename: document.filename, status: document.status });
        batch_index += 1;
    }

    if uploaded.is_empty() {
        return Err(ApiError(AppError::ValidationError("no files[] field present in multipart body".into())));
    }

    Ok(Json(UploadResponse { documents: uploaded }))
}

fn infer_content_type(filename: &str) -> String {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "text/plain",
    }
    .to_string()
}
