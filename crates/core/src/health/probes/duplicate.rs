//! Duplicate detection over a single or composite uniqueness candidate.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use super::plural;
use crate::datastore::{Predicate, Query};
use crate::errors::Result;
use crate::health::model::{Issue, IssueCategory, Severity, MAX_DETAIL_ITEMS};
use crate::health::traits::{Probe, ProbeContext};

/// A key value seen more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup<K = String> {
    pub value: K,
    pub count: u64,
}

/// Builds a frequency map and returns every value seen more than once,
/// ordered by value.
///
/// Composite keys are compared part by part, never as joined text.
pub fn find_duplicates<K, I>(values: I) -> Vec<DuplicateGroup<K>>
where
    K: Ord,
    I: IntoIterator<Item = K>,
{
    let mut frequencies: BTreeMap<K, u64> = BTreeMap::new();
    for value in values {
        *frequencies.entry(value).or_insert(0) += 1;
    }
    frequencies
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(value, count)| DuplicateGroup { value, count })
        .collect()
}

pub struct DuplicateProbe {
    table: String,
    columns: Vec<String>,
    severity: Severity,
}

impl DuplicateProbe {
    pub fn new(table: &str, columns: &[&str], severity: Severity) -> Self {
        Self {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            severity,
        }
    }
}

#[async_trait]
impl Probe for DuplicateProbe {
    fn id(&self) -> String {
        format!("duplicates:{}({})", self.table, self.columns.join(","))
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let limit = ctx.config().duplicate_scan_limit;
        let fields: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        let mut query = Query::table(&self.table).fields(&fields).limit(limit);
        for column in &self.columns {
            query = query.filter(Predicate::is_not_null(column));
        }
        let rows = ctx.select(&query).await?;

        let keys = rows.iter().filter_map(|row| {
            self.columns
                .iter()
                .map(|c| row.text(c))
                .collect::<Option<Vec<String>>>()
        });
        let groups = find_duplicates(keys);
        if groups.is_empty() {
            return Ok(Vec::new());
        }

        let affected: u64 = groups.iter().map(|g| g.count).sum();
        let key_label = self.columns.join(", ");
        let samples: Vec<_> = groups
            .iter()
            .take(MAX_DETAIL_ITEMS)
            .map(|g| match g.value.as_slice() {
                [single] => json!({ "value": single, "count": g.count }),
                parts => json!({ "value": parts, "count": g.count }),
            })
            .collect();

        Ok(vec![Issue::new(
            IssueCategory::DuplicateRecords,
            self.severity,
            &self.table,
            format!(
                "{} in {} share the same {} ({} rows)",
                plural(groups.len() as u64, "value", "values"),
                self.table,
                key_label,
                affected
            ),
        )
        .with_details(json!({
            "columns": self.columns,
            "groupCount": groups.len(),
            "groups": samples,
            "scannedRows": rows.len(),
            "truncated": rows.len() >= limit,
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

    #[test]
    fn test_find_duplicates_groups_and_counts() {
        let values = ["A", "A", "A", "B", "C", "C"].iter().map(|v| v.to_string());
        let groups = find_duplicates(values);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], DuplicateGroup { value: "A".to_string(), count: 3 });
        assert_eq!(groups[1], DuplicateGroup { value: "C".to_string(), count: 2 });
        assert_eq!(groups.iter().map(|g| g.count).sum::<u64>(), 5);
    }

    #[test]
    fn test_find_duplicates_unique_values() {
        let groups = find_duplicates(vec!["x".to_string(), "y".to_string()]);
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_probe_composite_key() {
        let store = InMemoryDataStore::new().with_table(
            "attendance",
            vec![
                Row::from(json!({"id": "a1", "student_id": "s1", "class_id": "c1", "date": "2024-03-01"})),
                Row::from(json!({"id": "a2", "student_id": "s1", "class_id": "c1", "date": "2024-03-01"})),
                Row::from(json!({"id": "a3", "student_id": "s1", "class_id": "c1", "date": "2024-03-02"})),
                Row::from(json!({"id": "a4", "student_id": "s2", "class_id": "c1", "date": "2024-03-01"})),
                Row::from(json!({"id": "a5", "student_id": null, "class_id": "c1", "date": "2024-03-01"})),
            ],
        );
        let run = RunContext::new(HealthConfig::default(), "test");
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let issues = DuplicateProbe::new(
            "attendance",
            &["student_id", "class_id", "date"],
            Severity::Warning,
        )
        .inspect(&ctx)
        .await
        .unwrap();

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].affected_count, Some(2));
        assert_eq!(issues[0].details["groupCount"], 1);
        assert_eq!(
            issues[0].details["groups"][0]["value"],
            json!(["s1", "c1", "2024-03-01"])
        );
    }

    #[test]
    fn test_composite_parts_do_not_collide() {
        let keys = vec![
            vec!["a | b".to_string(), "c".to_string()],
            vec!["a".to_string(), "b | c".to_string()],
        ];
        assert!(find_duplicates(keys).is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_probe_separator_in_values() {
        let store = InMemoryDataStore::new().with_table(
            "enrollments",
            vec![
                Row::from(json!({"id": "e1", "student_id": "s1 | c1", "class_id": "c2"})),
                Row::from(json!({"id": "e2", "student_id": "s1", "class_id": "c1 | c2"})),
            ],
        );
        let run = RunContext::new(HealthConfig::default(), "test");
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let issues = DuplicateProbe::new("enrollments", &["student_id", "class_id"], Severity::Warning)
            .inspect(&ctx)
            .await
            .unwrap();
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_probe_single_column_value_is_text() {
        let store = InMemoryDataStore::new().with_table(
            "students",
            vec![
                Row::from(json!({"id": "s1", "student_number": "S001"})),
                Row::from(json!({"id": "s2", "student_number": "S001"})),
            ],
        );
        let run = RunContext::new(HealthConfig::default(), "test");
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let issues = DuplicateProbe::new("students", &["student_number"], Severity::Critical)
            .inspect(&ctx)
            .await
            .unwrap();
        assert_eq!(issues[0].details["groups"][0], json!({"value": "S001", "count": 2}));
    }
}
