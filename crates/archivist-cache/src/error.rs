use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("pool error: {0}")]
    Pool(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

impl From<CacheError> for archivist_core::AppError {
    fn from(err: CacheError) -> Self {
        archivist_core::AppError::CacheUnavailable(err.to_string())
    }
}
