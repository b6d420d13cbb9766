//! DataStore over the school records in SQLite.

pub mod render;
pub mod repository;

pub use repository::SqliteDataStore;
