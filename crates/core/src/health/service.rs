//! Health service implementation.
//!
//! The HealthService orchestrates a run: it checks the store is reachable,
//! dispatches every checker as its own task, aggregates their results and
//! persists the run record.

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::datastore::DataStore;
use crate::errors::Result;

use super::checkers::{default_checkers, elapsed_ms};
use super::errors::HealthError;
use super::model::{CheckerKind, CheckerResult, HealthConfig, HealthRun, RunOutcome};
use super::traits::{Checker, HealthRunStore, HealthServiceTrait, RunContext};

/// Service for running health checks and reading past runs.
pub struct HealthService {
    /// Store the checkers inspect; also pinged before dispatch
    store: Arc<dyn DataStore>,

    /// Storage for run records
    run_store: Arc<dyn HealthRunStore>,

    /// Checkers dispatched on every run
    checkers: Vec<Arc<dyn Checker>>,

    /// Current configuration
    config: RwLock<HealthConfig>,
}

impl HealthService {
    /// Creates a health service with the four default checkers.
    pub fn new(store: Arc<dyn DataStore>, run_store: Arc<dyn HealthRunStore>) -> Self {
        let checkers = default_checkers(store.clone());
        Self::with_checkers(store, run_store, checkers)
    }

    /// Creates a health service with custom checkers.
    ///
    /// Results are keyed by [`Checker::kind`]; if two checkers share a kind,
    /// the later one's result is kept.
    pub fn with_checkers(
        store: Arc<dyn DataStore>,
        run_store: Arc<dyn HealthRunStore>,
        checkers: Vec<Arc<dyn Checker>>,
    ) -> Self {
        Self {
            store,
            run_store,
            checkers,
            config: RwLock::new(HealthConfig::default()),
        }
    }

    /// Replaces the initial configuration.
    pub fn with_config(self, config: HealthConfig) -> Self {
        Self {
            config: RwLock::new(config),
            ..self
        }
    }

    async fn ping(&self, ctx: &RunContext) -> Result<()> {
        let deadline = ctx.probe_deadline();
        match tokio::time::timeout_at(deadline.instant(), self.store.ping(deadline)).await {
            Ok(result) => result,
            Err(_) => Err(crate::errors::DatabaseError::Timeout(ctx.config.probe_timeout_ms).into()),
        }
    }

    /// Spawns every checker and waits for all of them.
    ///
    /// A checker task that panics or is cancelled is reported as a failed
    /// checker; its siblings are unaffected.
    async fn dispatch(&self, ctx: &RunContext) -> (BTreeMap<CheckerKind, CheckerResult>, Vec<String>) {
        let started = Instant::now();
        let (kinds, handles): (Vec<CheckerKind>, Vec<_>) = self
            .checkers
            .iter()
            .map(|checker| {
                let checker = Arc::clone(checker);
                let ctx = ctx.clone();
                (
                    checker.kind(),
                    tokio::spawn(async move { checker.run(&ctx).await }),
                )
            })
            .unzip();

        let mut results = BTreeMap::new();
        let mut errors = Vec::new();
        for (kind, joined) in kinds.into_iter().zip(join_all(handles).await) {
            let result = match joined {
                Ok(result) => {
                    if let Some(error) = result.error() {
                        errors.push(format!("{}: {}", kind, error));
                    }
                    result
                }
                Err(e) => {
                    let error = format!("checker task failed: {}", e);
                    warn!("{}", HealthError::checker_failed(kind.as_str(), &error));
                    errors.push(format!("{}: {}", kind, error));
                    CheckerResult::failed(error, elapsed_ms(started))
                }
            };
            debug!("Checker {} finished with status {:?}", kind, result.status());
            results.insert(kind, result);
        }
        (results, errors)
    }

    /// Runs every checker and persists the run.
    pub async fn run_full_check(&self, triggered_by: &str) -> RunOutcome {
        let started = Instant::now();
        let config = self.config.read().await.clone();
        let ctx = RunContext::new(config, triggered_by);

        info!("Starting health run triggered by '{}'", triggered_by);

        if let Err(e) = self.ping(&ctx).await {
            warn!("Health run aborted, data store unreachable: {}", e);
            return RunOutcome::aborted(
                format!("Data store unreachable: {}", e),
                elapsed_ms(started),
            );
        }

        let (results, mut errors) = self.dispatch(&ctx).await;
        let execution_time_ms = elapsed_ms(started);
        let run = HealthRun::new(ctx.triggered_by.clone(), ctx.now, results, execution_time_ms);
        let summary = run.summary();

        let (success, run_id) = match self.run_store.save_run(&run).await {
            Ok(()) => {
                info!(
                    "Health run {} completed: {} issue(s) ({} critical, {} warning, {} info) in {}ms",
                    run.id,
                    summary.total_issues,
                    summary.critical_count,
                    summary.warning_count,
                    summary.info_count,
                    execution_time_ms
                );
                (true, Some(run.id))
            }
            Err(e) => {
                warn!("Failed to persist health run {}: {}", run.id, e);
                errors.push(format!("Failed to persist health run: {}", e));
                (false, None)
            }
        };

        RunOutcome {
            success,
            run_id,
            summary,
            results: run.issues_detail,
            execution_time_ms,
            errors,
        }
    }
}

#[async_trait]
impl HealthServiceTrait for HealthService {
    async fn run_full_check(&self, triggered_by: &str) -> RunOutcome {
        HealthService::run_full_check(self, triggered_by).await
    }

    async fn get_run(&self, id: &str) -> Result<HealthRun> {
        self.run_store
            .get_run(id)
            .await?
            .ok_or_else(|| HealthError::RunNotFound(id.to_string()).into())
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<HealthRun>> {
        self.run_store.list_runs(limit).await
    }

    async fn get_config(&self) -> HealthConfig {
        self.config.read().await.clone()
    }

    async fn update_config(&self, config: HealthConfig) -> Result<()> {
        config.validate()?;
        *self.config.write().await = config;
        info!("Health configuration updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::InMemoryDataStore;
    use crate::health::tests::MockRunStore;

    fn service() -> HealthService {
        HealthService::new(
            Arc::new(InMemoryDataStore::new()),
            Arc::new(MockRunStore::new()),
        )
    }

    #[tokio::test]
    async fn test_config_validation() {
        let service = service();

        let invalid = HealthConfig {
            probe_timeout_ms: 0,
            ..Default::default()
        };
        assert!(service.update_config(invalid).await.is_err());
        assert_eq!(service.get_config().await, HealthConfig::default());

        let valid = HealthConfig {
            stale_after_days: 30,
            ..Default::default()
        };
        service.update_config(valid.clone()).await.unwrap();
        assert_eq!(service.get_config().await, valid);
    }

    #[tokio::test]
    async fn test_get_unknown_run() {
        let err = service().get_run("missing").await.unwrap_err();
        assert!(err.to_string().contains("Health run not found: missing"));
    }

    #[tokio::test]
    async fn test_unreachable_store_aborts_before_dispatch() {
        let store = Arc::new(InMemoryDataStore::new());
        store.set_offline(true);
        let run_store = Arc::new(MockRunStore::new());
        let service = HealthService::new(store.clone(), run_store.clone());

        let outcome = service.run_full_check("admin").await;
        assert!(!outcome.success);
        assert!(outcome.run_id.is_none());
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(store.call_count(), 1);
        assert_eq!(run_store.count_runs().await.unwrap(), 0);
    }
}
