//! Error types for the store crate.

use std::fmt;
use thiserror::Error;

/// Storage error kinds, mirrored into [`archivist_core::AppError`] at the
/// crate boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Database,
    Serialization,
    DocumentNotFound,
    TermNotFound,
    InvalidTransition,
    DimensionMismatch,
    Transaction,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Database => "database",
            ErrorKind::Serialization => "serialization",
            ErrorKind::DocumentNotFound => "document_not_found",
            ErrorKind::TermNotFound => "term_not_found",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::DimensionMismatch => "dimension_mismatch",
            ErrorKind::Transaction => "transaction",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StorageError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn document_not_found(id: i64) -> Self {
        Self::new(ErrorKind::DocumentNotFound, format!("document not found: {id}"))
    }

    pub fn term_not_found(term: impl Into<String>) -> Self {
        Self::new(ErrorKind::TermNotFound, format!("taxonomy term not found: {}", term.into()))
    }

    pub fn invalid_transition(from: &str, to: &str) -> Self {
        Self::new(
            ErrorKind::InvalidTransition,
            format!("illegal status transition: {from} -> {to}"),
        )
    }

    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        Self::new(
            ErrorKind::DimensionMismatch,
            format!("expected vector of length {expected}, got {got}"),
        )
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::database(err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::new(ErrorKind::Serialization, err.to_string()).with_source(err)
    }
}

impl From<StorageError> for archivist_core::AppError {
    fn from(err: StorageError) -> Self {
        match err.kind {
            ErrorKind::DocumentNotFound | ErrorKind::TermNotFound => {
                archivist_core::AppError::NotFound(err.message)
            }
            ErrorKind::InvalidTransition => archivist_core::AppError::ConflictingState(err.message),
            ErrorKind::DimensionMismatch | ErrorKind::Serialization => {
                archivist_core::AppError::ValidationError(err.message)
            }
            ErrorKind::Database | ErrorKind::Transaction => {
                archivist_core::AppError::StorageError(err.message)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_maps_to_conflicting_state() {
        let err = StorageError::invalid_transition("COMPLETED", "QUEUED");
        let app_err: archivist_core::AppError = err.into();
        assert_eq!(app_err.kind(), "ConflictingState");
    }

    #[test]
    fn not_found_maps_to_not_found() {
        let err = StorageError::document_not_found(42);
        let app_err: archivist_core::AppError = err.into();
        assert_eq!(app_err.kind(), "NotFound");
    }
}
