//! Threshold probes over row counts: inactivity ratio, volume growth and
//! run-record retention.

use async_trait::async_trait;
use serde_json::json;

use crate::constants::TABLE_HEALTH_RUNS;
use crate::datastore::{Predicate, Query};
use crate::errors::Result;
use crate::health::errors::HealthError;
use crate::health::model::{Issue, IssueCategory, Severity};
use crate::health::traits::{Probe, ProbeContext};

// =============================================================================
// Inactivity Ratio
// =============================================================================

/// Warns when the share of rows not in the active status is too high.
pub struct InactivityRatioProbe {
    table: String,
    status_column: String,
    active_value: String,
}

impl InactivityRatioProbe {
    pub fn new(table: &str, status_column: &str, active_value: &str) -> Self {
        Self {
            table: table.to_string(),
            status_column: status_column.to_string(),
            active_value: active_value.to_string(),
        }
    }
}

#[async_trait]
impl Probe for InactivityRatioProbe {
    fn id(&self) -> String {
        format!("inactivity:{}", self.table)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let total = ctx.count(&Query::table(&self.table)).await?;
        if total == 0 {
            return Ok(Vec::new());
        }
        let inactive = ctx
            .count(&Query::table(&self.table).filter(Predicate::any(vec![
                Predicate::not_eq(&self.status_column, self.active_value.as_str()),
                Predicate::is_null(&self.status_column),
            ])))
            .await?;

        let ratio = inactive as f64 / total as f64;
        let threshold = ctx.config().inactive_ratio_threshold;
        if ratio <= threshold {
            return Ok(Vec::new());
        }

        Ok(vec![Issue::new(
            IssueCategory::InactivityRatio,
            Severity::Warning,
            &self.table,
            format!(
                "{:.0}% of {} are not {}",
                ratio * 100.0,
                self.table,
                self.active_value
            ),
        )
        .with_details(json!({
            "total": total,
            "inactive": inactive,
            "ratio": ratio,
            "threshold": threshold,
        }))
        .with_affected_count(inactive)])
    }
}

// =============================================================================
// Volume Growth
// =============================================================================

/// Window-over-window growth factor; `None` when the previous window is empty.
pub fn growth_ratio(current: u64, previous: u64) -> Option<f64> {
    (previous > 0).then(|| current as f64 / previous as f64)
}

/// Reports unusual growth of new rows compared to the previous window.
pub struct VolumeGrowthProbe {
    table: String,
    column: String,
}

impl VolumeGrowthProbe {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

#[async_trait]
impl Probe for VolumeGrowthProbe {
    fn id(&self) -> String {
        format!("volume_growth:{}", self.table)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let window = ctx.config().growth_window_days;
        let current_start = ctx.run.days_ago(window)?;
        let doubled = window
            .checked_mul(2)
            .ok_or(HealthError::WindowOutOfRange { days: window })?;
        let previous_start = ctx.run.days_ago(doubled)?;

        let current = ctx
            .count(
                &Query::table(&self.table)
                    .filter(Predicate::gte(&self.column, current_start.as_str())),
            )
            .await?;
        let previous = ctx
            .count(
                &Query::table(&self.table)
                    .filter(Predicate::gte(&self.column, previous_start.as_str()))
                    .filter(Predicate::lt(&self.column, current_start.as_str())),
            )
            .await?;

        let threshold = ctx.config().growth_ratio_threshold;
        match growth_ratio(current, previous) {
            Some(ratio) if ratio > threshold => Ok(vec![Issue::new(
                IssueCategory::VolumeGrowth,
                Severity::Info,
                &self.table,
                format!(
                    "{} grew {:.1}x over the last {} days",
                    self.table, ratio, window
                ),
            )
            .with_details(json!({
                "currentWindow": current,
                "previousWindow": previous,
                "ratio": ratio,
                "threshold": threshold,
                "windowDays": window,
            }))
            .with_affected_count(current)]),
            _ => Ok(Vec::new()),
        }
    }
}

// =============================================================================
// Run Retention
// =============================================================================

/// Flags an audit history that keeps growing without a retention policy.
pub struct RunRetentionProbe;

impl RunRetentionProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RunRetentionProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for RunRetentionProbe {
    fn id(&self) -> String {
        "retention:health_runs".to_string()
    }

    fn table(&self) -> &str {
        TABLE_HEALTH_RUNS
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let count = ctx.count(&Query::table(TABLE_HEALTH_RUNS)).await?;
        let threshold = ctx.config().run_retention_threshold;
        if count <= threshold {
            return Ok(Vec::new());
        }

        Ok(vec![Issue::new(
            IssueCategory::Retention,
            Severity::Info,
            TABLE_HEALTH_RUNS,
            format!("{} health runs stored; consider pruning old runs", count),
        )
        .with_details(json!({ "threshold": threshold }))
        .with_affected_count(count)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::{Deadline, InMemoryDataStore, Row};
    use crate::health::model::HealthConfig;
    use crate::health::traits::RunContext;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn run(config: HealthConfig) -> RunContext {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 9, 0, 0).unwrap();
        RunContext::with_timestamp(config, "test", now)
    }

    #[test]
    fn test_growth_ratio() {
        assert_eq!(growth_ratio(30, 10), Some(3.0));
        assert_eq!(growth_ratio(5, 0), None);
        assert_eq!(growth_ratio(0, 4), Some(0.0));
    }

    #[tokio::test]
    async fn test_inactivity_ratio() {
        let status = |s: &str| Row::new().with("status", s);
        let store = InMemoryDataStore::new()
            .with_table(
                "teachers",
                vec![status("active"), status("inactive"), status("on_leave")],
            )
            .with_table("students", vec![status("active"), status("inactive")]);
        let run = run(HealthConfig::default());
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let issues = InactivityRatioProbe::new("teachers", "status", "active")
            .inspect(&ctx)
            .await
            .unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].affected_count, Some(2));
        assert_eq!(issues[0].message, "67% of teachers are not active");

        // exactly at the threshold is fine
        let issues = InactivityRatioProbe::new("students", "status", "active")
            .inspect(&ctx)
            .await
            .unwrap();
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn test_volume_growth() {
        let created = |d: &str| Row::new().with("created_at", d);
        let mut rows = vec![created("2024-05-10")];
        rows.extend((0..4).map(|_| created("2024-06-20")));
        let store = InMemoryDataStore::new().with_table("grades", rows);
        let run = run(HealthConfig::default());
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let issues = VolumeGrowthProbe::new("grades", "created_at").inspect(&ctx).await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].details["currentWindow"], 4);
        assert_eq!(issues[0].details["previousWindow"], 1);
    }

    #[tokio::test]
    async fn test_volume_growth_window_out_of_range_is_an_error() {
        let store = InMemoryDataStore::new().with_table("grades", vec![]);
        let run = run(HealthConfig {
            growth_window_days: 1_000_000_000,
            ..Default::default()
        });
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let err = VolumeGrowthProbe::new("grades", "created_at")
            .inspect(&ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn test_run_retention() {
        let store = InMemoryDataStore::new()
            .with_table("health_runs", (0..3).map(|_| Row::new()).collect());
        let config = HealthConfig {
            run_retention_threshold: 2,
            ..Default::default()
        };
        let run = run(config);
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let issues = RunRetentionProbe::new().inspect(&ctx).await.unwrap();
        assert_eq!(issues[0].affected_count, Some(3));
        assert_eq!(issues[0].category, IssueCategory::Retention);
    }
}
