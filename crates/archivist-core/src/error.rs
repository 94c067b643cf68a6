use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// The single error type that crosses every crate boundary in the
/// workspace. Each crate defines its own narrower error type and converts
/// into this one at the point where it would otherwise leak implementation
/// detail across a component seam.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("authentication error: {0}")]
    AuthError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflicting state: {0}")]
    ConflictingState(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("rate limited, retry after {retry_after_s}s")]
    RateLimited { retry_after_s: u64 },

    #[error("backpressure: {0}")]
    Backpressure(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("blob missing: {0}")]
    BlobMissing(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("malformed AI response: {0}")]
    MalformedAIResponse(String),

    #[error("transient error: {0}")]
    TransientError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

impl AppError {
    /// The `kind` string used in the `{error:{kind,...}}` HTTP envelope.
    /// Stable across releases — callers match on this, not on the
    /// `Display` message.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "ValidationError",
            AppError::AuthError(_) => "AuthError",
            AppError::NotFound(_) => "NotFound",
            AppError::ConflictingState(_) => "ConflictingState",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::RateLimited { .. } => "RateLimited",
            AppError::Backpressure(_) => "Backpressure",
            AppError::StorageError(_) => "StorageError",
            AppError::CacheUnavailable(_) => "CacheUnavailable",
            AppError::BlobMissing(_) => "BlobMissing",
            AppError::ProviderUnavailable(_) => "ProviderUnavailable",
            AppError::QuotaExhausted(_) => "QuotaExhausted",
            AppError::MalformedAIResponse(_) => "MalformedAIResponse",
            AppError::TransientError(_) => "TransientError",
            AppError::InternalError(_) => "InternalError",
        }
    }

    /// HTTP status code for this kind. 5xx kinds are collapsed to `InternalError`
    /// in the response body by [`AppError::to_envelope`]; `status_code`
    /// itself still distinguishes them for logging and metrics.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::ValidationError(_) => 400,
            AppError::AuthError(_) => 401,
            AppError::NotFound(_) => 404,
            AppError::ConflictingState(_) => 409,
            AppError::PayloadTooLarge(_) => 413,
            AppError::RateLimited { .. } => 429,
            AppError::Backpressure(_) => 503,
            AppError::BlobMissing(_) => 404,
            AppError::QuotaExhausted(_) => 503,
            AppError::ProviderUnavailable(_) => 503,
            AppError::CacheUnavailable(_) => 500,
            AppError::StorageError(_)
            | AppError::MalformedAIResponse(_)
            | AppError::TransientError(_)
            | AppError::InternalError(_) => 500,
        }
    }

    /// Whether a worker should retry the job that produced this error:
    /// `TransientError`, `RateLimited`, and transient `StorageError`s are
    /// retriable; `QuotaExhausted`, `MalformedAIResponse` (after the
    /// single re-ask), and `AuthError` are not.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            AppError::TransientError(_) | AppError::RateLimited { .. } | AppError::StorageError(_)
        )
    }

    /// Render the JSON envelope. 5xx kinds never leak their message;
    /// the caller-supplied `request_id` is the only detail returned.
    pub fn to_envelope(&self, request_id: &str) -> serde_json::Value {
        if self.status_code() >= 500 {
            serde_json::json!({
                "error": {
                    "kind": "InternalError",
                    "request_id": request_id,
                }
            })
        } else {
            serde_json::json!({
                "error": {
                    "kind": self.kind(),
                    "message": self.to_string(),
                }
            })
        }
    }

    pub fn validation<E: std::fmt::Display>(e: E) -> Self {
        Self::ValidationError(e.to_string())
    }

    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::InternalError(e.to_string())
    }

    pub fn storage<E: std::fmt::Display>(e: E) -> Self {
        Self::StorageError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_xx_envelope_never_includes_message() {
        let err = AppError::StorageError("connection to host 10.0.0.5 refused".into());
        let envelope = err.to_envelope("req-123");
        let rendered = envelope.to_string();
        assert!(!rendered.contains("10.0.0.5"));
        assert_eq!(envelope["error"]["kind"], "InternalError");
        assert_eq!(envelope["error"]["request_id"], "req-123");
    }

    #[test]
    fn four_xx_envelope_includes_message() {
        let err = AppError::ValidationError("filename too long".into());
        let envelope = err.to_envelope("req-456");
        assert_eq!(envelope["error"]["kind"], "ValidationError");
        assert_eq!(envelope["error"]["message"], "validation error: filename too long");
    }

    #[test]
    fn retriable_kinds_match_spec() {
        assert!(AppError::TransientError("timeout".into()).is_retriable());
        assert!(AppError::RateLimited { retry_after_s: 5 }.is_retriable());
        assert!(!AppError::QuotaExhausted("monthly cap".into()).is_retriable());
        assert!(!AppError::MalformedAIResponse("no closing brace".into()).is_retriable());
    }

    #[test]
    fn status_codes_match_spec_table() {
        assert_eq!(AppError::ValidationError("x".into()).status_code(), 400);
        assert_eq!(AppError::AuthError("x".into()).status_code(), 401);
        assert_eq!(AppError::NotFound("x".into()).status_code(), 404);
        assert_eq!(AppError::ConflictingState("x".into()).status_code(), 409);
        assert_eq!(AppError::PayloadTooLarge("x".into()).status_code(), 413);
        assert_eq!(AppError::RateLimited { retry_after_s: 1 }.status_code(), 429);
        assert_eq!(AppError::Backpressure("x".into()).status_code(), 503);
    }
}
