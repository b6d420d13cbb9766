//! Freshness and recent-activity probes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::json;

use crate::datastore::{Predicate, Query, SortDirection};
use crate::errors::Result;
use crate::health::errors::HealthError;
use crate::health::model::{Issue, IssueCategory, Severity};
use crate::health::traits::{Probe, ProbeContext};

/// Parses the timestamp shapes stored in the records tables: RFC 3339,
/// naive `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` (taken as UTC), and
/// plain dates (midnight UTC).
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Reports a table whose newest record is older than `stale_after_days`.
pub struct FreshnessProbe {
    table: String,
    column: String,
}

impl FreshnessProbe {
    pub fn new(table: &str, column: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

#[async_trait]
impl Probe for FreshnessProbe {
    fn id(&self) -> String {
        format!("freshness:{}", self.table)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let newest = ctx
            .select(
                &Query::table(&self.table)
                    .fields(&[self.column.as_str()])
                    .filter(Predicate::is_not_null(&self.column))
                    .order_by(&self.column, SortDirection::Desc)
                    .limit(1),
            )
            .await?;

        let Some(raw) = newest.first().and_then(|r| r.text(&self.column)) else {
            return Ok(vec![Issue::new(
                IssueCategory::DataFreshness,
                Severity::Info,
                &self.table,
                format!("No {} records yet", self.table),
            )
            .with_affected_count(0)]);
        };

        let latest = parse_timestamp(&raw)
            .ok_or_else(|| HealthError::unreadable(&self.table, &self.column, raw.clone()))?;
        let age_days = (ctx.run.now - latest).num_days();
        let threshold = ctx.config().stale_after_days;
        if age_days <= threshold {
            return Ok(Vec::new());
        }

        Ok(vec![Issue::new(
            IssueCategory::DataFreshness,
            Severity::Info,
            &self.table,
            format!(
                "No new {} records in {} days",
                self.table, age_days
            ),
        )
        .with_details(json!({
            "latest": raw,
            "ageDays": age_days,
            "thresholdDays": threshold,
        }))])
    }
}

/// Reports a table with no records inside a recent window.
pub struct RecentActivityProbe {
    table: String,
    column: String,
    /// Fixed window; `None` uses `recent_activity_days`
    window_days: Option<i64>,
    severity: Severity,
}

impl RecentActivityProbe {
    pub fn new(table: &str, column: &str, severity: Severity) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            window_days: None,
            severity,
        }
    }

    pub fn with_window(mut self, days: i64) -> Self {
        self.window_days = Some(days);
        self
    }
}

#[async_trait]
impl Probe for RecentActivityProbe {
    fn id(&self) -> String {
        format!("recent_activity:{}", self.table)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let window = self
            .window_days
            .unwrap_or(ctx.config().recent_activity_days);
        let since = ctx.run.days_ago(window)?;
        let count = ctx
            .count(&Query::table(&self.table).filter(Predicate::gte(&self.column, since.as_str())))
            .await?;
        if count > 0 {
            return Ok(Vec::new());
        }

        Ok(vec![Issue::new(
            IssueCategory::RecentActivity,
            self.severity,
            &self.table,
            format!("No {} recorded in the last {} days", self.table, window),
        )
        .with_details(json!({ "since": since, "windowDays": window }))
        .with_affected_count(0)])
    }
}
