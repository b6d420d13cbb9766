//! Denormalized-copy probe.
//!
//! Some tables keep a copy of a parent's column (a student's name on a grade,
//! a class's period on an enrollment). The probe samples dependent rows,
//! fetches their parents in one `In` query and compares the copy with the
//! value rebuilt from the parent. Rows whose parent is missing are left to
//! the orphan probes.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;

use super::{distinct_keys, plural};
use crate::datastore::{Predicate, Query, Row};
use crate::errors::Result;
use crate::health::model::{Issue, IssueCategory, Severity, MAX_DETAIL_ITEMS};
use crate::health::traits::{Probe, ProbeContext};

pub struct DenormalizedCopyProbe {
    table: String,
    fk_column: String,
    copy_column: String,
    parent_table: String,
    /// Parent columns joined with a space to rebuild the copy
    source_columns: Vec<String>,
    severity: Severity,
}

impl DenormalizedCopyProbe {
    pub fn new(
        table: &str,
        fk_column: &str,
        copy_column: &str,
        parent_table: &str,
        source_columns: &[&str],
        severity: Severity,
    ) -> Self {
        Self {
            table: table.to_string(),
            fk_column: fk_column.to_string(),
            copy_column: copy_column.to_string(),
            parent_table: parent_table.to_string(),
            source_columns: source_columns.iter().map(|c| c.to_string()).collect(),
            severity,
        }
    }

    fn expected(&self, parent: &Row) -> Option<String> {
        let parts: Vec<String> = self
            .source_columns
            .iter()
            .map(|c| parent.text(c))
            .collect::<Option<_>>()?;
        Some(parts.join(" "))
    }
}

#[async_trait]
impl Probe for DenormalizedCopyProbe {
    fn id(&self) -> String {
        format!("denormalized:{}.{}", self.table, self.copy_column)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let limit = ctx.config().orphan_sample_limit;
        let rows = ctx
            .select(
                &Query::table(&self.table)
                    .fields(&["id", self.fk_column.as_str(), self.copy_column.as_str()])
                    .filter(Predicate::is_not_null(&self.fk_column))
                    .limit(limit),
            )
            .await?;

        let keys = distinct_keys(&rows, &self.fk_column);
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut parent_fields = vec!["id"];
        parent_fields.extend(self.source_columns.iter().map(String::as_str));
        let parents = ctx
            .select(
                &Query::table(&self.parent_table)
                    .fields(&parent_fields)
                    .filter(Predicate::is_in("id", keys.values().cloned())),
            )
            .await?;
        let expected: HashMap<String, Option<String>> = parents
            .iter()
            .filter_map(|p| Some((p.text("id")?, self.expected(p))))
            .collect();

        let mismatched: Vec<serde_json::Value> = rows
            .iter()
            .filter_map(|row| {
                let key = row.text(&self.fk_column)?;
                let want = expected.get(&key)?.as_ref()?;
                let have = row.text(&self.copy_column);
                if have.as_deref().map(str::trim) == Some(want.trim()) {
                    return None;
                }
                Some(json!({
                    "id": row.text("id"),
                    "stored": have,
                    "expected": want,
                }))
            })
            .collect();

        if mismatched.is_empty() {
            return Ok(Vec::new());
        }

        let count = mismatched.len() as u64;
        Ok(vec![Issue::new(
            IssueCategory::DenormalizedMismatch,
            self.severity,
            &self.table,
            format!(
                "{} out of sync with {}",
                plural(
                    count,
                    &format!("{}.{} value is", self.table, self.copy_column),
                    &format!("{}.{} values are", self.table, self.copy_column)
                ),
                self.parent_table
            ),
        )
        .with_details(json!({
            "column": self.copy_column,
            "source": format!("{}({})", self.parent_table, self.source_columns.join(" + ")),
            "samples": mismatched.iter().take(MAX_DETAIL_ITEMS).collect::<Vec<_>>(),
            "sampledRows": rows.len(),
        }))
        .with_affected_count(count)])
    }
}
