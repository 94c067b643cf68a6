//! AI Gateway failure taxonomy.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Error, Debug, Clone)]
pub enum AiError {
    #[error("transient error: {0}")]
    Transient(String),

    #[error("rate limited, retry after {retry_after_s}s")]
    RateLimited { retry_after_s: u64 },

    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("malformed AI response: {0}")]
    MalformedResponse(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl AiError {
    /// Retry policy only covers `Transient`/`RateLimited`;
    /// `MalformedResponse` and `QuotaExhausted` never retry at this layer.
    pub fn is_retriable(&self) -> bool {
        matches!(self, AiError::Transient(_) | AiError::RateLimited { .. })
    }

    /// Whether this error should trip the circuit breaker towards `open`
    ///.
    pub fn trips_circuit(&self) -> bool {
        matches!(
            self,
            AiError::Transient(_)
                | AiError::RateLimited { .. }
                | AiError::QuotaExhausted(_)
                | AiError::ProviderUnavailable(_)
        )
    }

    /// `QuotaExhausted` short-circuits the provider for the remainder of
    /// the cooldown regardless of the consecutive-failure counter.
    pub fn forces_open(&self) -> bool {
        matches!(self, AiError::QuotaExhausted(_) | AiError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Transient(format!("request timed out: {err}"))
        } else if err.status().map(|s| s.as_u16()) == Some(429) {
            AiError::RateLimited { retry_after_s: 5 }
        } else if err.status().map(|s| s.as_u16()) == Some(401) {
            AiError::Unauthorized(err.to_string())
        } else {
            AiError::Transient(err.to_string())
        }
    }
}

impl From<AiError> for archivist_core::AppError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::Transient(m) => archivist_core::AppError::TransientError(m),
            AiError::RateLimited { retry_after_s } => archivist_core::AppError::RateLimited { retry_after_s },
            AiError::QuotaExhausted(m) => archivist_core::AppError::QuotaExhausted(m),
            AiError::MalformedResponse(m) => archivist_core::AppError::MalformedAIResponse(m),
            AiError::Unauthorized(m) => archivist_core::AppError::AuthError(m),
            AiError::ProviderUnavailable(m) => archivist_core::AppError::ProviderUnavailable(m),
        }
    }
}
