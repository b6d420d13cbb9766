//! Health engine error types.
//!
//! This module defines health-specific errors that can occur while probes
//! and checkers execute, and while runs are configured or looked up.

use thiserror::Error;

/// Errors specific to health engine operations.
#[derive(Error, Debug)]
pub enum HealthError {
    /// A probe failed to execute.
    #[error("Check '{check_id}' failed: {message}")]
    CheckFailed { check_id: String, message: String },

    /// A checker could not execute at all.
    #[error("Checker '{checker}' failed: {message}")]
    CheckerFailed { checker: String, message: String },

    /// A probe did not finish before its deadline.
    #[error("Check '{check_id}' timed out after {timeout_ms}ms")]
    ProbeTimedOut { check_id: String, timeout_ms: u64 },

    /// A probe panicked instead of returning an error.
    #[error("Check '{check_id}' panicked: {message}")]
    ProbePanicked { check_id: String, message: String },

    /// A relative date window does not fit the calendar.
    #[error("Date window of {days} days is out of range")]
    WindowOutOfRange { days: i64 },

    /// Configuration validation error.
    #[error("Invalid health configuration: {0}")]
    InvalidConfig(String),

    /// A stored value could not be interpreted by a probe.
    #[error("Unreadable value in {table}.{column}: {value}")]
    UnreadableValue {
        table: String,
        column: String,
        value: String,
    },

    /// No health run exists with the given id.
    #[error("Health run not found: {0}")]
    RunNotFound(String),
}

impl HealthError {
    /// Creates a CheckFailed error.
    pub fn check_failed(check_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CheckFailed {
            check_id: check_id.into(),
            message: message.into(),
        }
    }

    /// Creates a CheckerFailed error.
    pub fn checker_failed(checker: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CheckerFailed {
            checker: checker.into(),
            message: message.into(),
        }
    }

    pub fn unreadable(table: &str, column: &str, value: impl Into<String>) -> Self {
        Self::UnreadableValue {
            table: table.to_string(),
            column: column.to_string(),
            value: value.into(),
        }
    }
}

// Convert to core Error type
impl From<HealthError> for crate::errors::Error {
    fn from(err: HealthError) -> Self {
        match err {
            HealthError::InvalidConfig(msg) => crate::errors::Error::InvalidConfigValue(msg),
            HealthError::RunNotFound(_) => crate::errors::Error::NotFound(err.to_string()),
            other => crate::errors::Error::Health(other.to_string()),
        }
    }
}
