//! Shared domain models, configuration, and error types for the archivist
//! document catalog.
//!
//! Every other crate in the workspace depends on this one for the
//! `Document`/`TaxonomyTerm`/`Session` family of types, the top-level
//! [`AppError`] kind list, and the [`Settings`] configuration struct.

pub mod config;
pub mod error;
pub mod model;

pub use config::Settings;
pub use error::{AppError, Result};
