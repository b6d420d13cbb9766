//! Health engine module.
//!
//! This module provides the diagnostic engine that audits the school records
//! store for structural integrity, referential consistency, domain-rule
//! violations and operational health signals, and keeps an audit trail of
//! every run.
//!
//! # Architecture
//!
//! The engine fans out twice:
//!
//! ```text
//! HealthService → [Checker tasks] → Probes (concurrent) → DataStore
//!      ↓                ↓
//! HealthRun      CheckerResult{issues}
//!      ↓
//! HealthRunStore (persistence)
//! ```
//!
//! - **Models** (`model.rs`) - Severity, Issue, CheckerResult, RunSummary, HealthRun
//! - **Traits** (`traits.rs`) - Probe, Checker, run storage and contexts
//! - **Errors** (`errors.rs`) - Health-specific error types
//! - **Probes** (`probes/`) - Individual diagnostic queries
//! - **Checkers** (`checkers/`) - Probe groups with a guarded executor
//! - **Service** (`service.rs`) - Orchestrates a run and persists it
//!
//! # Failure Handling
//!
//! - A probe that errors or times out becomes an info `probe_failure` issue
//! - A checker that cannot start reports a critical result with `error` set
//! - A run aborts (`success: false`) only when the store is unreachable
//!   before dispatch, or when the run record cannot be persisted
//!
//! # Severity Levels
//!
//! - **Info** - Informational; an info-only run is still healthy
//! - **Warning** - Should be addressed but not urgent
//! - **Critical** - Data is wrong or the engine could not inspect it

pub mod errors;
pub mod model;
pub mod traits;

pub mod checkers;
pub mod probes;
pub mod service;


// Re-export commonly used types
pub use errors::HealthError;
pub use model::{
    CheckerKind, CheckerResult, CheckerStatus, HealthConfig, HealthRun, Issue, IssueCategory,
    OverallStatus, RunOutcome, RunSummary, Severity,
};
pub use traits::{Checker, HealthRunStore, HealthServiceTrait, Probe, ProbeContext, RunContext};

// Re-export service
pub use service::HealthService;

pub use checkers::{
    default_checkers, BusinessRulesChecker, DataValidationChecker, IntegrityChecker,
    OperationalHealthChecker,
};
