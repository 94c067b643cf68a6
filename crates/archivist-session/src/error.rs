use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session backend error: {0}")]
    Backend(#[from] archivist_cache::CacheError),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SessionError> for archivist_core::AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Backend(e) => e.into(),
            SessionError::Encryption(msg) => archivist_core::AppError::InternalError(msg),
            SessionError::Serialization(e) => archivist_core::AppError::InternalError(e.to_string()),
        }
    }
}
