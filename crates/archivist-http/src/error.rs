//! Maps `archivist_core::AppError` onto the spec.md §7 JSON envelope and
//! HTTP status line. Every handler in this crate returns
//! `Result<_, ApiError>` so `?` works against any collaborator's error
//! type that already converts into `AppError` (every crate in the
//! workspace does, at its own boundary).

use archivist_core::AppError;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::new_v4().to_string();
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(request_id = %request_id, error = %self.0, "request failed");
        } else {
            tracing::debug!(request_id = %request_id, kind = self.0.kind(), "request rejected");
        }

        let body = Json(self.0.to_envelope(&request_id));
        let mut response = (status, body).into_response();

        let retry_after = match &self.0 {
            AppError::RateLimited { retry_after_s } => Some(*retry_after_s),
            AppError::Backpressure(_) => Some(30),
            _ => None,
        };
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("retry-after", value);
            }
        }

        response
    }
}
