//! The Taxonomy Engine: a hierarchical controlled
//! vocabulary with synonym resolution and keyword-mapping validation,
//! held as a read-mostly in-memory snapshot over `archivist-store`.

pub mod engine;
pub mod error;
pub mod resolve;
pub mod snapshot;
pub mod source;

pub use engine::{TaxonomyEngine, TaxonomyStatistics, ValidationOutcome};
pub use error::{Result, TaxonomyError};
pub use resolve::normalize;
pub use snapshot::TaxonomySnapshot;
pub use source::TaxonomySourceRow;
