//! Typed access to the relational store: documents,
//! taxonomy, and search analytics, with vector, full-text, and JSON
//! columns behind one `Store` trait.
//!
//! `PgStore` is the production adapter (Postgres + `pgvector` + native
//! `tsvector`); `MemStore` is an in-memory test double implementing the
//! exact same contract, used throughout the rest of the workspace's test
//! suites so they never need a live database.

pub mod error;
pub mod mem;
pub mod pg;
pub mod store;

pub use error::{ErrorKind, Result, StorageError};
pub use mem::MemStore;
pub use pg::PgStore;
pub use store::{DocumentPage, Page, ScoredHit, Store, TaxonomyUpsert, TaxonomyUpsertCounts};
