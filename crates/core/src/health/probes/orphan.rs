//! Referential integrity probe.
//!
//! Samples dependent rows with a non-null foreign key, collects the distinct
//! key values and looks them up in the parent table with one `In` query.
//! Keys with no parent row are orphans.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;

use super::{distinct_keys, plural};
use crate::datastore::{Predicate, Query};
use crate::errors::Result;
use crate::health::model::{Issue, IssueCategory, Severity, MAX_DETAIL_ITEMS};
use crate::health::traits::{Probe, ProbeContext};

pub struct OrphanProbe {
    table: String,
    column: String,
    parent_table: String,
    parent_key: String,
    severity: Severity,
}

impl OrphanProbe {
    /// `table.column` references `parent_table.id`.
    pub fn new(table: &str, column: &str, parent_table: &str, severity: Severity) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            parent_table: parent_table.to_string(),
            parent_key: "id".to_string(),
            severity,
        }
    }
}

#[async_trait]
impl Probe for OrphanProbe {
    fn id(&self) -> String {
        format!("orphans:{}.{}", self.table, self.column)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let limit = ctx.config().orphan_sample_limit;
        let rows = ctx
            .select(
                &Query::table(&self.table)
                    .fields(&["id", self.column.as_str()])
                    .filter(Predicate::is_not_null(&self.column))
                    .limit(limit),
            )
            .await?;

        let present = distinct_keys(&rows, &self.column);
        if present.is_empty() {
            return Ok(Vec::new());
        }

        let parents = ctx
            .select(
                &Query::table(&self.parent_table)
                    .fields(&[self.parent_key.as_str()])
                    .filter(Predicate::is_in(&self.parent_key, present.values().cloned())),
            )
            .await?;
        let valid: HashSet<String> = parents
            .iter()
            .filter_map(|r| r.text(&self.parent_key))
            .collect();

        let orphans: Vec<&String> = present.keys().filter(|k| !valid.contains(*k)).collect();
        if orphans.is_empty() {
            return Ok(Vec::new());
        }

        let orphaned_rows: Vec<String> = rows
            .iter()
            .filter(|r| r.text(&self.column).is_some_and(|v| !valid.contains(&v)))
            .filter_map(|r| r.text("id"))
            .collect();
        let affected = orphaned_rows.len() as u64;

        Ok(vec![Issue::new(
            IssueCategory::OrphanedRecords,
            self.severity,
            &self.table,
            format!(
                "{} reference missing {} via {}",
                plural(affected, &format!("{} row", self.table), &format!("{} rows", self.table)),
                self.parent_table,
                self.column
            ),
        )
        .with_details(json!({
            "column": self.column,
            "references": format!("{}.{}", self.parent_table, self.parent_key),
            "orphanedKeys": orphans.iter().take(MAX_DETAIL_ITEMS).collect::<Vec<_>>(),
            "orphanedKeyCount": orphans.len(),
            "sampleRowIds": orphaned_rows.iter().take(MAX_DETAIL_ITEMS).collect::<Vec<_>>(),
            "sampledRows": rows.len(),
            "sampleLimit": limit,
        }))
        .with_affected_count(affected)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::{Deadline, InMemoryDataStore, Row};
    use crate::health::model::HealthConfig;
    use crate::health::traits::RunContext;
    use serde_json::json;
    use std::time::Duration;

    fn store() -> InMemoryDataStore {
        InMemoryDataStore::new()
            .with_table(
                "students",
                vec![Row::new().with("id", "s1"), Row::new().with("id", "s2")],
            )
            .with_table(
                "grades",
                vec![
                    Row::from(json!({"id": "g1", "student_id": "s1"})),
                    Row::from(json!({"id": "g2", "student_id": "s2"})),
                    Row::from(json!({"id": "g3", "student_id": "ghost"})),
                    Row::from(json!({"id": "g4", "student_id": "ghost"})),
                    Row::from(json!({"id": "g5", "student_id": null})),
                ],
            )
    }

    #[tokio::test]
    async fn test_orphan_reported_once() {
        let store = store();
        let run = RunContext::new(HealthConfig::default(), "test");
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let issues = OrphanProbe::new("grades", "student_id", "students", Severity::Critical)
            .inspect(&ctx)
            .await
            .unwrap();

        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.category, IssueCategory::OrphanedRecords);
        assert_eq!(issue.severity, Severity::Critical);
        assert_eq!(issue.affected_count, Some(2));
        assert_eq!(issue.details["orphanedKeys"], json!(["ghost"]));
        assert_eq!(issue.details["sampleRowIds"], json!(["g3", "g4"]));
    }

    #[tokio::test]
    async fn test_matched_keys_are_not_orphans() {
        let store = store();
        store
            .insert("students", Row::new().with("id", "ghost"))
            .unwrap();
        let run = RunContext::new(HealthConfig::default(), "test");
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let issues = OrphanProbe::new("grades", "student_id", "students", Severity::Critical)
            .inspect(&ctx)
            .await
            .unwrap();
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn test_missing_parent_table_is_an_error() {
        let store = InMemoryDataStore::new().with_table(
            "grades",
            vec![Row::from(json!({"id": "g1", "student_id": "s1"}))],
        );
        let run = RunContext::new(HealthConfig::default(), "test");
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let result = OrphanProbe::new("grades", "student_id", "students", Severity::Critical)
            .inspect(&ctx)
            .await;
        assert!(result.is_err());
    }
}
