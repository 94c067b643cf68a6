use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Store(#[from] archivist_store::StorageError),

    #[error(transparent)]
    Cache(#[from] archivist_cache::CacheError),

    #[error(transparent)]
    Ai(#[from] archivist_ai::AiError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SearchError> for archivist_core::AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Store(e) => e.into(),
            SearchError::Cache(e) => e.into(),
            SearchError::Ai(e) => e.into(),
            SearchError::Serialization(e) => archivist_core::AppError::InternalError(e.to_string()),
        }
    }
}
