//! Handlers for the spec.md §6.1 HTTP API, one module per resource group.

pub mod auth;
pub mod documents;
pub mod health;
pub mod search;
pub mod taxonomy;
pub mod upload;
