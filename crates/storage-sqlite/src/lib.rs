//! SQLite storage implementation for Scholaris.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the traits defined in `scholaris-core` and contains:
//! - Database connection pooling and management
//! - Diesel migrations for the school records and the health run audit trail
//! - The SQLite `DataStore` the health engine reads through
//! - The `HealthRunStore` repository
//!
//! # Architecture
//!
//! This crate is the only place in the application where Diesel dependencies exist.
//! The core crate is database-agnostic and works with traits.
//!
//! ```text
//!        core (health engine)
//!              │
//!              ▼
//!     storage-sqlite (this crate)
//!              │
//!              ▼
//!          SQLite DB
//! ```

pub mod datastore;
pub mod db;
pub mod errors;
pub mod health;
pub mod schema;
pub mod utils;

// Re-export database utilities
pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};

pub use datastore::SqliteDataStore;
pub use health::HealthRunRepository;

// Re-export storage errors and conversion helpers
pub use errors::{IntoCore, StorageError};

// Re-export from scholaris-core for convenience
pub use scholaris_core::errors::{DatabaseError, Error, Result};
