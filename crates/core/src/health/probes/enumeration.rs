//! Enumeration probe: values outside a closed set.

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeSet;

use super::{plural, sample_ids};
use crate::datastore::{Predicate, Query};
use crate::errors::Result;
use crate::health::model::{Issue, IssueCategory, Severity, MAX_DETAIL_ITEMS};
use crate::health::traits::{Probe, ProbeContext};

pub struct EnumerationProbe {
    table: String,
    column: String,
    allowed: Vec<&'static str>,
    allow_null: bool,
    severity: Severity,
}

impl EnumerationProbe {
    /// NULL counts as invalid unless [`EnumerationProbe::nullable`] is set.
    pub fn new(table: &str, column: &str, allowed: &[&'static str], severity: Severity) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            allowed: allowed.to_vec(),
            allow_null: false,
            severity,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.allow_null = true;
        self
    }
}

#[async_trait]
impl Probe for EnumerationProbe {
    fn id(&self) -> String {
        format!("enumeration:{}.{}", self.table, self.column)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let limit = ctx.config().violation_sample_limit;
        let mut alternatives = vec![Predicate::not_in(&self.column, self.allowed.iter().copied())];
        if !self.allow_null {
            alternatives.push(Predicate::is_null(&self.column));
        }
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

        let found: BTreeSet<String> = rows
            .iter()
            .map(|r| r.text(&self.column).unwrap_or_else(|| "NULL".to_string()))
            .collect();
        let count = rows.len() as u64;

        Ok(vec![Issue::new(
            IssueCategory::InvalidEnumeration,
            self.severity,
            &self.table,
            format!(
                "{} have an invalid {}",
                plural(count, &format!("{} row", self.table), &format!("{} rows", self.table)),
                self.column
            ),
        )
        .with_details(json!({
            "column": self.column,
            "allowed": self.allowed,
            "invalidValues": found.iter().take(MAX_DETAIL_ITEMS).collect::<Vec<_>>(),
            "sampleIds": sample_ids(&rows),
            "truncated": rows.len() >= limit,
        }))
        .with_affected_count(count)])
    }
}
