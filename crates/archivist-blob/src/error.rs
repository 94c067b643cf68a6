use thiserror::Error;

pub type Result<T> = std::result::Result<T, BlobError>;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("backend error: {0}")]
    Backend(#[from] object_store::Error),
}

impl From<BlobError> for archivist_core::AppError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(key) => archivist_core::AppError::BlobMissing(key),
            BlobError::InvalidKey(msg) => archivist_core::AppError::ValidationError(msg),
            BlobError::Backend(e) => archivist_core::AppError::StorageError(e.to_string()),
        }
    }
}
