//! Scholaris Core - data health engine for school records.
//!
//! This crate contains the diagnostic engine that audits a live school records
//! store. It is database-agnostic: it talks to the store through the
//! [`datastore::DataStore`] trait, which is implemented by the `storage-sqlite`
//! crate (and by the in-memory store shipped here for tests).

pub mod constants;
pub mod datastore;
pub mod errors;
pub mod health;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
