//! Health storage module.
//!
//! Provides persistence for health run audit records.

pub mod model;
pub mod repository;

pub use model::HealthRunDB;
pub use repository::HealthRunRepository;
