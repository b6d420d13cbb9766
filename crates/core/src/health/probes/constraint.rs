//! Constraint probes: numeric ranges and required fields.

use async_trait::async_trait;
use serde_json::json;

use super::{plural, sample_ids};
use crate::datastore::{Predicate, Query};
use crate::errors::Result;
use crate::health::model::{Issue, IssueCategory, Severity};
use crate::health::traits::{Probe, ProbeContext};

/// Flags rows whose value is NULL or outside `[min, max]`.
pub struct RangeProbe {
    table: String,
    column: String,
    min: f64,
    max: f64,
    severity: Severity,
}

impl RangeProbe {
    pub fn new(table: &str, column: &str, min: f64, max: f64, severity: Severity) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            min,
            max,
            severity,
        }
    }
}

#[async_trait]
impl Probe for RangeProbe {
    fn id(&self) -> String {
        format!("range:{}.{}", self.table, self.column)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let limit = ctx.config().violation_sample_limit;
        let rows = ctx
            .select(
                &Query::table(&self.table)
                    .fields(&["id", self.column.as_str()])
                    .filter(Predicate::any(vec![
                        Predicate::lt(&self.column, self.min),
                        Predicate::gt(&self.column, self.max),
                        Predicate::is_null(&self.column),
                    ]))
                    .limit(limit),
            )
            .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let count = rows.len() as u64;
        let null_count = rows
            .iter()
            .filter(|r| r.get(&self.column).map_or(true, |v| v.is_null()))
            .count();

        Ok(vec![Issue::new(
            IssueCategory::ConstraintViolation,
            self.severity,
            &self.table,
            format!(
                "{} have {} missing or outside [{}, {}]",
                plural(count, &format!("{} row", self.table), &format!("{} rows", self.table)),
                self.column,
                self.min,
                self.max
            ),
        )
        .with_details(json!({
            "column": self.column,
            "min": self.min,
            "max": self.max,
            "nullCount": null_count,
            "outOfRangeCount": rows.len() - null_count,
            "sampleIds": sample_ids(&rows),
            "truncated": rows.len() >= limit,
        }))
        .with_affected_count(count)])
    }
}

/// Counts rows where a required column is NULL or blank.
pub struct RequiredFieldProbe {
    table: String,
    column: String,
    severity: Severity,
}

impl RequiredFieldProbe {
    pub fn new(table: &str, column: &str, severity: Severity) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            severity,
        }
    }
}

#[async_trait]
impl Probe for RequiredFieldProbe {
    fn id(&self) -> String {
        format!("required:{}.{}", self.table, self.column)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let count = ctx
            .count(&Query::table(&self.table).filter(Predicate::any(vec![
                Predicate::is_null(&self.column),
                Predicate::eq(&self.column, ""),
            ])))
            .await?;

        if count == 0 {
            return Ok(Vec::new());
        }

        Ok(vec![Issue::new(
            IssueCategory::MissingRequiredField,
            self.severity,
            &self.table,
            format!(
                "{} missing {}",
                plural(count, &format!("{} row is", self.table), &format!("{} rows are", self.table)),
                self.column
            ),
        )
        .with_details(json!({ "column": self.column }))
        .with_affected_count(count)])
    }
}
