//! Date sanity and field-order probes.
//!
//! Dates are ISO-8601 text, so bounds are compared lexically. A bound of
//! `<today>T23:59:59` accepts both plain dates and timestamps from today.

use async_trait::async_trait;
use chrono::{Months, NaiveDate};
use serde_json::json;
use std::cmp::Ordering;

use super::{plural, sample_ids};
use crate::datastore::{compare_json, Predicate, Query, Row};
use crate::errors::Result;
use crate::health::model::{Issue, IssueCategory, Severity, MAX_DETAIL_ITEMS};
use crate::health::traits::{Probe, ProbeContext};

// =============================================================================
// Date Sanity
// =============================================================================

/// Flags dates in the future and, optionally, implausibly old dates.
pub struct DateSanityProbe {
    table: String,
    column: String,
    reject_older_than_max_age: bool,
    severity: Severity,
}

impl DateSanityProbe {
    /// Flags dates after today.
    pub fn not_in_future(table: &str, column: &str, severity: Severity) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            reject_older_than_max_age: false,
            severity,
        }
    }

    /// Flags dates after today or older than `max_student_age_years`.
    pub fn birth_date(table: &str, column: &str, severity: Severity) -> Self {
        Self {
            reject_older_than_max_age: true,
            ..Self::not_in_future(table, column, severity)
        }
    }
}

#[async_trait]
impl Probe for DateSanityProbe {
    fn id(&self) -> String {
        format!("date_sanity:{}.{}", self.table, self.column)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let limit = ctx.config().violation_sample_limit;
        let today = ctx.run.today();
        let latest = format!("{}T23:59:59", today.format("%Y-%m-%d"));

        let mut alternatives = vec![Predicate::gt(&self.column, latest.as_str())];
        let earliest = if self.reject_older_than_max_age {
            let years = ctx.config().max_student_age_years.clamp(0, i64::from(u32::MAX / 12));
            let earliest = today
                .checked_sub_months(Months::new(years as u32 * 12))
                .unwrap_or(NaiveDate::MIN)
                .format("%Y-%m-%d")
                .to_string();
            alternatives.push(Predicate::lt(&self.column, earliest.as_str()));
            Some(earliest)
        } else {
            None
        };

        let rows = ctx
            .select(
                &Query::table(&self.table)
                    .fields(&["id", self.column.as_str()])
                    .filter(Predicate::any(alternatives))
                    .limit(limit),
            )
            .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let future_count = rows
            .iter()
            .filter(|r| r.text(&self.column).is_some_and(|d| d > latest))
            .count();
        let count = rows.len() as u64;

        Ok(vec![Issue::new(
            IssueCategory::DateSanity,
            self.severity,
            &self.table,
            format!(
                "{} have an implausible {}",
                plural(count, &format!("{} row", self.table), &format!("{} rows", self.table)),
                self.column
            ),
        )
        .with_details(json!({
            "column": self.column,
            "futureCount": future_count,
            "tooOldCount": rows.len() - future_count,
            "latestAllowed": latest,
            "earliestAllowed": earliest,
            "sampleIds": sample_ids(&rows),
            "truncated": rows.len() >= limit,
        }))
        .with_affected_count(count)])
    }
}

// =============================================================================
// Field Order
// =============================================================================

/// Flags rows where `lower` sorts after `upper` (or equals it when strict).
///
/// Column-to-column comparison is not expressible as a predicate, so rows
/// with both columns set are scanned up to `duplicate_scan_limit`.
pub struct FieldOrderProbe {
    table: String,
    lower: String,
    upper: String,
    strict: bool,
    severity: Severity,
}

impl FieldOrderProbe {
    /// Requires `lower <= upper`.
    pub fn new(table: &str, lower: &str, upper: &str, severity: Severity) -> Self {
        Self {
            table: table.to_string(),
            lower: lower.to_string(),
            upper: upper.to_string(),
            strict: false,
            severity,
        }
    }

    /// Requires `lower < upper`.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    fn violates(&self, row: &Row) -> bool {
        let (Some(lower), Some(upper)) = (row.get(&self.lower), row.get(&self.upper)) else {
            return false;
        };
        match compare_json(lower, upper) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => self.strict,
            _ => false,
        }
    }
}

#[async_trait]
impl Probe for FieldOrderProbe {
    fn id(&self) -> String {
        format!("field_order:{}.{}<{}", self.table, self.lower, self.upper)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let limit = ctx.config().duplicate_scan_limit;
        let rows = ctx
            .select(
                &Query::table(&self.table)
                    .fields(&["id", self.lower.as_str(), self.upper.as_str()])
                    .filter(Predicate::is_not_null(&self.lower))
                    .filter(Predicate::is_not_null(&self.upper))
                    .limit(limit),
            )
            .await?;

        let violations: Vec<&Row> = rows.iter().filter(|r| self.violates(r)).collect();
        if violations.is_empty() {
            return Ok(Vec::new());
        }

        let count = violations.len() as u64;
        let relation = if self.strict { "before" } else { "on or before" };
        let ids: Vec<String> = violations
            .iter()
            .filter_map(|r| r.text("id"))
            .take(MAX_DETAIL_ITEMS)
            .collect();

        Ok(vec![Issue::new(
            IssueCategory::FieldOrder,
            self.severity,
            &self.table,
            format!(
                "{} where {} is not {} {}",
                plural(count, &format!("{} row", self.table), &format!("{} rows", self.table)),
                self.lower,
                relation,
                self.upper
            ),
        )
        .with_details(json!({
            "lower": self.lower,
            "upper": self.upper,
            "strict": self.strict,
            "sampleIds": ids,
            "scannedRows": rows.len(),
            "truncated": rows.len() >= limit,
        }))
        .with_affected_count(count)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::{Deadline, InMemoryDataStore};
    use crate::health::model::HealthConfig;
    use crate::health::traits::RunContext;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::time::Duration;

    fn run() -> RunContext {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();
        RunContext::with_timestamp(HealthConfig::default(), "test", now)
    }

    #[tokio::test]
    async fn test_birth_dates() {
        let store = InMemoryDataStore::new().with_table(
            "students",
            vec![
                Row::from(json!({"id": "s1", "date_of_birth": "2010-04-01"})),
                Row::from(json!({"id": "s2", "date_of_birth": "2030-01-01"})),
                Row::from(json!({"id": "s3", "date_of_birth": "1901-01-01"})),
                Row::from(json!({"id": "s4", "date_of_birth": null})),
            ],
        );
        let run = run();
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let issues = DateSanityProbe::birth_date("students", "date_of_birth", Severity::Warning)
            .inspect(&ctx)
            .await
            .unwrap();
        assert_eq!(issues[0].affected_count, Some(2));
        assert_eq!(issues[0].details["futureCount"], 1);
        assert_eq!(issues[0].details["tooOldCount"], 1);
        assert_eq!(issues[0].details["earliestAllowed"], "1924-06-15");
    }

    #[tokio::test]
    async fn test_timestamps_from_today_are_not_future() {
        let store = InMemoryDataStore::new().with_table(
            "grades",
            vec![
                Row::from(json!({"id": "g1", "graded_at": "2024-06-15T16:30:00"})),
                Row::from(json!({"id": "g2", "graded_at": "2024-06-15"})),
            ],
        );
        let run = run();
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let issues = DateSanityProbe::not_in_future("grades", "graded_at", Severity::Info)
            .inspect(&ctx)
            .await
            .unwrap();
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn test_field_order() {
        let store = InMemoryDataStore::new().with_table(
            "schedules",
            vec![
                Row::from(json!({"id": "sc1", "start_time": "09:00", "end_time": "10:00"})),
                Row::from(json!({"id": "sc2", "start_time": "11:00", "end_time": "10:00"})),
                Row::from(json!({"id": "sc3", "start_time": "12:00", "end_time": "12:00"})),
                Row::from(json!({"id": "sc4", "start_time": "12:00", "end_time": null})),
            ],
        );
        let run = run();
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let lenient = FieldOrderProbe::new("schedules", "start_time", "end_time", Severity::Warning)
            .inspect(&ctx)
            .await
            .unwrap();
        assert_eq!(lenient[0].affected_count, Some(1));

        let strict = FieldOrderProbe::new("schedules", "start_time", "end_time", Severity::Warning)
            .strict()
            .inspect(&ctx)
            .await
            .unwrap();
        assert_eq!(strict[0].affected_count, Some(2));
        assert_eq!(strict[0].details["sampleIds"], json!(["sc2", "sc3"]));
    }
}
