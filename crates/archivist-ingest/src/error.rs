//! Ingestion-local error kind, converting at
//! the `archivist_core::AppError` boundary the way every other crate does.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("blob missing: {0}")]
    BlobMissing(String),

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("DAG cycle detected")]
    DagCycleDetected,

    #[error("missing dependency: {0}")]
    MissingDependency(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Store(#[from] archivist_store::StorageError),

    #[error(transparent)]
    Cache(#[from] archivist_cache::CacheError),

    #[error(transparent)]
    Blob(#[from] archivist_blob::BlobError),

    #[error(transparent)]
    Ai(#[from] archivist_ai::AiError),

    #[error(transparent)]
    Taxonomy(#[from] archivist_taxonomy::TaxonomyError),
}

impl IngestError {
    pub fn serialization<E: std::fmt::Display>(e: E) -> Self {
        Self::Serialization(e.to_string())
    }

    /// Whether this error should `nack` with backoff rather than fail the
    /// document terminally.
    pub fn is_retriable(&self) -> bool {
        match self {
            IngestError::Store(e) => matches!(e.kind, archivist_store::ErrorKind::Database | archivist_store::ErrorKind::Transaction),
            IngestError::Cache(_) => true,
            IngestError::Ai(e) => e.is_retriable(),
            IngestError::BlobMissing(_)
            | IngestError::Extraction(_)
            | IngestError::Embedding(_)
            | IngestError::InvalidStateTransition { .. }
            | IngestError::JobNotFound(_)
            | IngestError::DagCycleDetected
            | IngestError::MissingDependency(_)
            | IngestError::Serialization(_)
            | IngestError::Blob(_)
            | IngestError::Taxonomy(_) => false,
        }
    }
}

impl From<IngestError> for archivist_core::AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::BlobMissing(m) => archivist_core::AppError::BlobMissing(m),
            IngestError::Extraction(m) => archivist_core::AppError::TransientError(format!("extraction: {m}")),
            IngestError::Embedding(m) => archivist_core::AppError::TransientError(format!("embedding: {m}")),
            IngestError::Store(e) => e.into(),
            IngestError::Cache(e) => e.into(),
            IngestError::Blob(e) => e.into(),
            IngestError::Ai(e) => e.into(),
            IngestError::Taxonomy(e) => e.into(),
            other => archivist_core::AppError::InternalError(other.to_string()),
        }
    }
}
