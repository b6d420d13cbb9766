//! Checker implementations.
//!
//! Each checker owns a fixed set of probes for one concern:
//! - Integrity (structure, references, constraints, duplicates)
//! - Data validation (enumerations, dates, field order, formats, copies)
//! - Business rules (active period, timetable, capacity, workflow)
//! - Operational health (freshness, activity, growth, configuration)
//!
//! All of them share the same execution path: count the anchor tables,
//! then run every probe concurrently under its own deadline.

pub mod business_rules;
pub mod data_validation;
pub mod integrity;
pub mod operational_health;

pub use business_rules::BusinessRulesChecker;
pub use data_validation::DataValidationChecker;
pub use integrity::IntegrityChecker;
pub use operational_health::OperationalHealthChecker;

use futures::future::join_all;
use futures::FutureExt;
use log::{debug, warn};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use super::errors::HealthError;
use super::model::{CheckerKind, CheckerResult, Issue};
use super::traits::{Checker, Probe, ProbeContext, RunContext};
use crate::datastore::{DataStore, Query};
use crate::errors::Result;

/// Builds the four default checkers over one store.
pub fn default_checkers(store: Arc<dyn DataStore>) -> Vec<Arc<dyn Checker>> {
    vec![
        Arc::new(IntegrityChecker::new(store.clone())),
        Arc::new(DataValidationChecker::new(store.clone())),
        Arc::new(BusinessRulesChecker::new(store.clone())),
        Arc::new(OperationalHealthChecker::new(store)),
    ]
}

/// Runs one probe under its deadline.
///
/// Errors, panics and timeouts never escape: they become a single
/// info-level `probe_failure` issue naming the probe.
pub async fn run_probe(probe: &dyn Probe, store: &dyn DataStore, ctx: &RunContext) -> Vec<Issue> {
    let deadline = ctx.probe_deadline();
    let probe_ctx = ProbeContext::new(store, ctx, deadline);
    let id = probe.id();
    let guarded = AssertUnwindSafe(probe.inspect(&probe_ctx)).catch_unwind();

    match tokio::time::timeout_at(deadline.instant(), guarded).await {
        Ok(Ok(Ok(issues))) => {
            debug!("Probe {} found {} issue(s)", id, issues.len());
            issues
        }
        Ok(Ok(Err(e))) => {
            warn!("Probe {} failed: {}", id, e);
            vec![Issue::probe_failure(&id, probe.table(), &e.to_string())]
        }
        Ok(Err(payload)) => {
            let err = HealthError::ProbePanicked {
                check_id: id.clone(),
                message: panic_message(payload.as_ref()),
            };
            warn!("{}", err);
            vec![Issue::probe_failure(&id, probe.table(), &err.to_string())]
        }
        Err(_) => {
            let err = HealthError::ProbeTimedOut {
                check_id: id.clone(),
                timeout_ms: ctx.config.probe_timeout_ms,
            };
            warn!("{}", err);
            vec![Issue::probe_failure(&id, probe.table(), &err.to_string())]
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs every probe concurrently and concatenates their issues in probe order.
pub async fn execute_probes(
    probes: &[Box<dyn Probe>],
    store: &dyn DataStore,
    ctx: &RunContext,
) -> Vec<Issue> {
    join_all(probes.iter().map(|p| run_probe(p.as_ref(), store, ctx)))
        .await
        .into_iter()
        .flatten()
        .collect()
}

/// Counts each anchor table; any failure means the checker cannot run.
async fn preflight(store: &dyn DataStore, anchors: &[&str], ctx: &RunContext) -> Result<()> {
    for anchor in anchors {
        store
            .count(&Query::table(*anchor), ctx.probe_deadline())
            .await?;
    }
    Ok(())
}

/// Shared body of every checker's `run`.
pub(crate) async fn run_checker(
    kind: CheckerKind,
    store: &dyn DataStore,
    anchors: &[&str],
    probes: &[Box<dyn Probe>],
    ctx: &RunContext,
) -> CheckerResult {
    let started = Instant::now();

    if let Err(e) = preflight(store, anchors, ctx).await {
        warn!("{}", HealthError::checker_failed(kind.as_str(), e.to_string()));
        return CheckerResult::failed(e.to_string(), elapsed_ms(started));
    }

    let issues = execute_probes(probes, store, ctx).await;
    let elapsed = elapsed_ms(started);
    debug!(
        "Checker {} completed with {} issue(s) in {}ms",
        kind,
        issues.len(),
        elapsed
    );
    CheckerResult::completed(issues, elapsed)
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Boxes a probe for a checker's probe list.
pub(crate) fn boxed<P: Probe + 'static>(probe: P) -> Box<dyn Probe> {
    Box::new(probe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::{InMemoryDataStore, Row};
    use crate::health::model::{HealthConfig, IssueCategory, Severity};
    use crate::health::probes::{EmptyTableProbe, OrphanProbe};
    use async_trait::async_trait;
    use std::time::Duration;

    struct PanickingProbe;

    #[async_trait]
    impl Probe for PanickingProbe {
        fn id(&self) -> String {
            "panics:students".to_string()
        }

        fn table(&self) -> &str {
            "students"
        }

        async fn inspect(&self, _ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
            panic!("date arithmetic overflowed");
        }
    }

    #[tokio::test]
    async fn test_failing_probe_becomes_info_issue() {
        let store = InMemoryDataStore::new()
            .with_table("students", vec![Row::new().with("id", "s1")])
            .with_table("grades", vec![Row::new().with("id", "g1").with("student_id", "s1")]);
        store.fail_entity("grades").unwrap();
        let ctx = RunContext::new(HealthConfig::default(), "test");

        let probes = vec![
            boxed(OrphanProbe::new("grades", "student_id", "students", Severity::Critical)),
            boxed(EmptyTableProbe::new("students", Severity::Warning)),
        ];
        let issues = execute_probes(&probes, &store, &ctx).await;

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::ProbeFailure);
        assert_eq!(issues[0].severity, Severity::Info);
        assert_eq!(issues[0].details["probe"], "orphans:grades.student_id");
    }

    #[tokio::test]
    async fn test_panicking_probe_does_not_abort_siblings() {
        let store = InMemoryDataStore::new().with_table("students", vec![]);
        let ctx = RunContext::new(HealthConfig::default(), "test");
        let probes = vec![
            boxed(PanickingProbe),
            boxed(EmptyTableProbe::new("students", Severity::Warning)),
        ];

        let result = run_checker(CheckerKind::OperationalHealth, &store, &["students"], &probes, &ctx).await;
        assert!(result.error().is_none());
        let issues = result.issues();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].category, IssueCategory::ProbeFailure);
        let error = issues[0].details["error"].as_str().unwrap();
        assert!(error.contains("date arithmetic overflowed"));
        assert_eq!(issues[1].category, IssueCategory::EmptyTable);
    }

    #[tokio::test]
    async fn test_slow_probe_times_out() {
        let store = InMemoryDataStore::new().with_table("students", vec![]);
        store
            .delay_entity("students", Duration::from_secs(30))
            .unwrap();
        let config = HealthConfig {
            probe_timeout_ms: 20,
            ..Default::default()
        };
        let ctx = RunContext::new(config, "test");

        let issues = run_probe(&EmptyTableProbe::new("students", Severity::Warning), &store, &ctx).await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::ProbeFailure);
    }

    #[tokio::test]
    async fn test_preflight_failure_fails_checker() {
        let store = InMemoryDataStore::new();
        let ctx = RunContext::new(HealthConfig::default(), "test");
        let probes = vec![boxed(EmptyTableProbe::new("students", Severity::Warning))];

        let result = run_checker(CheckerKind::Integrity, &store, &["students"], &probes, &ctx).await;
        assert!(result.error().is_some_and(|e| e.contains("no such table")));
        assert!(result.issues().is_empty());
    }
}
