//! Health engine traits.
//!
//! This module defines the abstract interfaces of the engine:
//! - `Probe` - A single diagnostic query family
//! - `Checker` - A named group of probes run as one unit
//! - `HealthRunStore` - Persistence of run records
//! - `RunContext` / `ProbeContext` - What probes and checkers execute against

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use std::time::Duration;

use super::errors::HealthError;
use super::model::{CheckerKind, CheckerResult, HealthConfig, HealthRun, Issue, RunOutcome};
use crate::datastore::{DataStore, Deadline, Query, Row};
use crate::errors::Result;

// =============================================================================
// Run Context
// =============================================================================

/// Context shared by every checker of one run.
///
/// Contains the configuration snapshot and a single timestamp so that every
/// probe of the run evaluates relative dates the same way.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: HealthConfig,

    /// Current timestamp for age and window calculations
    pub now: DateTime<Utc>,

    /// Identity that triggered the run
    pub triggered_by: String,
}

impl RunContext {
    pub fn new(config: HealthConfig, triggered_by: impl Into<String>) -> Self {
        Self::with_timestamp(config, triggered_by, Utc::now())
    }

    /// Creates a context with a specific timestamp (for testing).
    pub fn with_timestamp(
        config: HealthConfig,
        triggered_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            config,
            now,
            triggered_by: triggered_by.into(),
        }
    }

    /// Deadline for a probe starting now.
    pub fn probe_deadline(&self) -> Deadline {
        Deadline::after(Duration::from_millis(self.config.probe_timeout_ms))
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    /// ISO date `days` before today.
    pub fn days_ago(&self, days: i64) -> Result<String> {
        let date = TimeDelta::try_days(days)
            .and_then(|delta| self.today().checked_sub_signed(delta))
            .ok_or(HealthError::WindowOutOfRange { days })?;
        Ok(date.format("%Y-%m-%d").to_string())
    }
}

// =============================================================================
// Probe Context
// =============================================================================

/// What a single probe executes against: the store, the run, and the
/// deadline every one of its queries shares.
pub struct ProbeContext<'a> {
    pub store: &'a dyn DataStore,
    pub run: &'a RunContext,
    pub deadline: Deadline,
}

impl<'a> ProbeContext<'a> {
    pub fn new(store: &'a dyn DataStore, run: &'a RunContext, deadline: Deadline) -> Self {
        Self {
            store,
            run,
            deadline,
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.run.config
    }

    pub async fn count(&self, query: &Query) -> Result<u64> {
        self.store.count(query, self.deadline).await
    }

    pub async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        self.store.select(query, self.deadline).await
    }
}

// =============================================================================
// Probe Trait
// =============================================================================

/// A read-only diagnostic over one or two tables.
///
/// # Implementation Notes
///
/// - Probes never write and have no side effects
/// - A probe returns `Err` only when it cannot evaluate; the checker turns
///   that into an info-level `probe_failure` issue
/// - Cross-table probes fetch keys first and then look them up with an `In`
///   predicate
#[async_trait]
pub trait Probe: Send + Sync {
    /// Stable identifier, used in logs and failure issues.
    fn id(&self) -> String;

    /// Table the probe's findings are reported against.
    fn table(&self) -> &str;

    /// Runs the probe and returns any findings.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The store, run context and deadline to execute with
    ///
    /// # Returns
    ///
    /// Zero or more issues. An empty vector means the probe found nothing.
    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>>;
}

// =============================================================================
// Checker Trait
// =============================================================================

/// A group of probes run as one unit.
///
/// `run` never fails: a checker that cannot execute reports
/// [`CheckerResult::Failed`].
#[async_trait]
pub trait Checker: Send + Sync {
    fn kind(&self) -> CheckerKind;

    async fn run(&self, ctx: &RunContext) -> CheckerResult;
}

// =============================================================================
// Health Run Store Trait
// =============================================================================

/// Storage interface for health run records.
///
/// Runs are insert-only; there is no update or delete.
#[async_trait]
pub trait HealthRunStore: Send + Sync {
    /// Persists a new run record.
    ///
    /// # Arguments
    ///
    /// * `run` - The run to insert; its id must not exist yet
    async fn save_run(&self, run: &HealthRun) -> Result<()>;

    /// Gets a run by id.
    ///
    /// # Returns
    ///
    /// The run if found, None otherwise
    async fn get_run(&self, id: &str) -> Result<Option<HealthRun>>;

    /// Lists the most recent runs, newest first.
    async fn list_runs(&self, limit: usize) -> Result<Vec<HealthRun>>;

    /// Number of stored runs.
    async fn count_runs(&self) -> Result<u64>;
}

// =============================================================================
// Health Service Trait
// =============================================================================

/// Service interface for the health engine.
#[async_trait]
pub trait HealthServiceTrait: Send + Sync {
    /// Runs every checker, persists the run and returns its outcome.
    ///
    /// Never returns an error: failures are reported inside the outcome.
    ///
    /// # Arguments
    ///
    /// * `triggered_by` - Identity recorded as `checked_by` on the run
    async fn run_full_check(&self, triggered_by: &str) -> RunOutcome;

    /// Gets a stored run by id.
    async fn get_run(&self, id: &str) -> Result<HealthRun>;

    /// Lists the most recent stored runs, newest first.
    async fn list_runs(&self, limit: usize) -> Result<Vec<HealthRun>>;

    /// Gets the current health configuration.
    async fn get_config(&self) -> HealthConfig;

    /// Updates the health configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The new configuration, validated before it is applied
    async fn update_config(&self, config: HealthConfig) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_context_dates() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let ctx = RunContext::with_timestamp(HealthConfig::default(), "admin", now);

        assert_eq!(ctx.triggered_by, "admin");
        assert_eq!(ctx.today().to_string(), "2024-03-10");
        assert_eq!(ctx.days_ago(10).unwrap(), "2024-02-29");
        assert!(ctx.days_ago(1_000_000_000).is_err());
        assert!(ctx.days_ago(i64::MAX).is_err());
    }

    #[tokio::test]
    async fn test_probe_deadline_uses_config_timeout() {
        let config = HealthConfig {
            probe_timeout_ms: 60_000,
            ..Default::default()
        };
        let ctx = RunContext::new(config, "admin");
        let remaining = ctx.probe_deadline().remaining();
        assert!(remaining > Duration::from_secs(50));
        assert!(remaining <= Duration::from_secs(60));
    }
}
