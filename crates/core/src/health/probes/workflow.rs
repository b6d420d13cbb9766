//! Workflow consistency probes.

use async_trait::async_trait;
use serde_json::json;

use super::{distinct_keys, plural};
use crate::constants::{TABLE_ENROLLMENTS, TABLE_STUDENTS};
use crate::datastore::{Predicate, Query};
use crate::errors::Result;
use crate::health::model::{Issue, IssueCategory, Severity};
use crate::health::traits::{Probe, ProbeContext};

/// Counts rows in a state that should never occur, described by predicates.
pub struct StateRuleProbe {
    name: &'static str,
    table: String,
    predicates: Vec<Predicate>,
    description: &'static str,
    severity: Severity,
}

impl StateRuleProbe {
    /// `description` reads after "N rows", e.g. "withdrawn without a date".
    pub fn new(
        name: &'static str,
        table: &str,
        predicates: Vec<Predicate>,
        description: &'static str,
        severity: Severity,
    ) -> Self {
        Self {
            name,
            table: table.to_string(),
            predicates,
            description,
            severity,
        }
    }
}

#[async_trait]
impl Probe for StateRuleProbe {
    fn id(&self) -> String {
        format!("workflow:{}", self.name)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let query = self
            .predicates
            .iter()
            .cloned()
            .fold(Query::table(&self.table), Query::filter);
        let count = ctx.count(&query).await?;
        if count == 0 {
            return Ok(Vec::new());
        }

        Ok(vec![Issue::new(
            IssueCategory::WorkflowInconsistency,
            self.severity,
            &self.table,
            format!(
                "{}: {} {}",
                self.table,
                plural(count, "row", "rows"),
                self.description
            ),
        )
        .with_details(json!({ "rule": self.name }))
        .with_affected_count(count)])
    }
}

/// Students who graduated or transferred but still hold an active enrollment.
pub struct DepartedStudentEnrollmentProbe {
    severity: Severity,
}

impl DepartedStudentEnrollmentProbe {
    const DEPARTED: [&'static str; 2] = ["graduated", "transferred"];

    pub fn new(severity: Severity) -> Self {
        Self { severity }
    }
}

#[async_trait]
impl Probe for DepartedStudentEnrollmentProbe {
    fn id(&self) -> String {
        "workflow:departed_student_enrolled".to_string()
    }

    fn table(&self) -> &str {
        TABLE_ENROLLMENTS
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let students = ctx
            .select(
                &Query::table(TABLE_STUDENTS)
                    .fields(&["id"])
                    .filter(Predicate::is_in("status", Self::DEPARTED))
                    .limit(ctx.config().orphan_sample_limit),
            )
            .await?;

        let ids = distinct_keys(&students, "id");
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let count = ctx
            .count(
                &Query::table(TABLE_ENROLLMENTS)
                    .filter(Predicate::eq("status", "enrolled"))
                    .filter(Predicate::is_in("student_id", ids.values().cloned())),
            )
            .await?;
        if count == 0 {
            return Ok(Vec::new());
        }

        Ok(vec![Issue::new(
            IssueCategory::WorkflowInconsistency,
            self.severity,
            TABLE_ENROLLMENTS,
            format!(
                "{} to graduated or transferred students",
                plural(count, "active enrollment belongs", "active enrollments belong")
            ),
        )
        .with_details(json!({
            "rule": "departed_student_enrolled",
            "sampledStudents": students.len(),
        }))
        .with_affected_count(count)])
    }
}
