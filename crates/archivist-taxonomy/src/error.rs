use thiserror::Error;

pub type Result<T> = std::result::Result<T, TaxonomyError>;

#[derive(Error, Debug)]
pub enum TaxonomyError {
    #[error("unknown taxonomy term: {0}")]
    UnknownTerm(String),

    #[error("cycle detected in taxonomy parent relation at term {0:?}")]
    Cycle(String),

    #[error(transparent)]
    Store(#[from] archivist_store::StorageError),
}

impl From<TaxonomyError> for archivist_core::AppError {
    fn from(err: TaxonomyError) -> Self {
        match err {
            TaxonomyError::UnknownTerm(t) => archivist_core::AppError::NotFound(format!("taxonomy term {t}")),
            TaxonomyError::Cycle(t) => archivist_core::AppError::ValidationError(format!("cyclic parent relation at {t}")),
            TaxonomyError::Store(e) => e.into(),
        }
    }
}
