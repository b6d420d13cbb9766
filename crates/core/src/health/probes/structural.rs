//! Structural probes: is a table reachable, and does it hold any rows.

use async_trait::async_trait;
use serde_json::json;

use crate::datastore::Query;
use crate::errors::Result;
use crate::health::model::{Issue, IssueCategory, Severity};
use crate::health::traits::{Probe, ProbeContext};

/// Reports a table the store cannot read.
///
/// The query error is the finding, so it is reported as a critical issue
/// instead of a probe failure.
pub struct TableAccessProbe {
    table: String,
}

impl TableAccessProbe {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
        }
    }
}

#[async_trait]
impl Probe for TableAccessProbe {
    fn id(&self) -> String {
        format!("table_access:{}", self.table)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        match ctx.count(&Query::table(&self.table)).await {
            Ok(_) => Ok(Vec::new()),
            Err(e) => Ok(vec![Issue::new(
                IssueCategory::TableAccess,
                Severity::Critical,
                &self.table,
                format!("Table '{}' is not accessible", self.table),
            )
            .with_details(json!({ "error": e.to_string() }))]),
        }
    }
}

/// Reports a table without any rows.
pub struct EmptyTableProbe {
    table: String,
    severity: Severity,
}

impl EmptyTableProbe {
    pub fn new(table: &str, severity: Severity) -> Self {
        Self {
            table: table.to_string(),
            severity,
        }
    }
}

#[async_trait]
impl Probe for EmptyTableProbe {
    fn id(&self) -> String {
        format!("empty_table:{}", self.table)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let count = ctx.count(&Query::table(&self.table)).await?;
        if count > 0 {
            return Ok(Vec::new());
        }
        Ok(vec![Issue::new(
            IssueCategory::EmptyTable,
            self.severity,
            &self.table,
            format!("Table '{}' has no records", self.table),
        )
        .with_affected_count(0)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::{Deadline, InMemoryDataStore, Row};
    use crate::health::model::HealthConfig;
    use crate::health::traits::RunContext;
    use std::time::Duration;

    #[tokio::test]
    async fn test_structural_probes() {
        let store = InMemoryDataStore::new()
            .with_table("teachers", vec![])
            .with_table("students", vec![Row::new().with("id", "s1")]);
        let run = RunContext::new(HealthConfig::default(), "test");
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        assert!(TableAccessProbe::new("students").inspect(&ctx).await.unwrap().is_empty());
        let missing = TableAccessProbe::new("subjects").inspect(&ctx).await.unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].severity, Severity::Critical);
        assert_eq!(missing[0].category, IssueCategory::TableAccess);

        let empty = EmptyTableProbe::new("teachers", Severity::Warning)
            .inspect(&ctx)
            .await
            .unwrap();
        assert_eq!(empty.len(), 1);
        assert!(EmptyTableProbe::new("students", Severity::Warning)
            .inspect(&ctx)
            .await
            .unwrap()
            .is_empty());
    }
}
