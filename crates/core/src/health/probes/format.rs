//! Format probe for email addresses.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

use super::plural;
use crate::datastore::{Predicate, Query};
use crate::errors::Result;
use crate::health::model::{Issue, IssueCategory, Severity, MAX_DETAIL_ITEMS};
use crate::health::traits::{Probe, ProbeContext};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid email regex pattern")
});

pub struct EmailFormatProbe {
    table: String,
    column: String,
    severity: Severity,
}

impl EmailFormatProbe {
    pub fn new(table: &str, column: &str, severity: Severity) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            severity,
        }
    }
}

#[async_trait]
impl Probe for EmailFormatProbe {
    fn id(&self) -> String {
        format!("format:{}.{}", self.table, self.column)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let limit = ctx.config().duplicate_scan_limit;
        let rows = ctx
            .select(
                &Query::table(&self.table)
                    .fields(&["id", self.column.as_str()])
                    .filter(Predicate::is_not_null(&self.column))
                    .filter(Predicate::not_eq(&self.column, ""))
                    .limit(limit),
            )
            .await?;

        let invalid: Vec<(String, String)> = rows
            .iter()
            .filter_map(|r| {
                let value = r.text(&self.column)?;
                if EMAIL_REGEX.is_match(value.trim()) {
                    None
                } else {
                    Some((r.text("id").unwrap_or_default(), value))
                }
            })
            .collect();

        if invalid.is_empty() {
            return Ok(Vec::new());
        }

        let count = invalid.len() as u64;
        let samples: Vec<_> = invalid
            .iter()
            .take(MAX_DETAIL_ITEMS)
            .map(|(id, value)| json!({ "id": id, "value": value }))
            .collect();

        Ok(vec![Issue::new(
            IssueCategory::InvalidFormat,
            self.severity,
            &self.table,
            format!(
                "{} a malformed {}",
                plural(count, &format!("{} row has", self.table), &format!("{} rows have", self.table)),
                self.column
            ),
        )
        .with_details(json!({
            "column": self.column,
            "samples": samples,
            "scannedRows": rows.len(),
            "truncated": rows.len() >= limit,
        }))
        .with_affected_count(count)])
    }
}
