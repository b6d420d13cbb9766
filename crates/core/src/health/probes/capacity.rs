//! Class capacity probe.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;

use super::{distinct_keys, plural};
use crate::constants::{TABLE_CLASSES, TABLE_ENROLLMENTS};
use crate::datastore::{Predicate, Query};
use crate::errors::Result;
use crate::health::model::{Issue, IssueCategory, Severity, MAX_DETAIL_ITEMS};
use crate::health::traits::{Probe, ProbeContext};

/// Enrollment status that occupies a seat.
const SEAT_STATUS: &str = "enrolled";

/// Flags classes whose active enrollments exceed their capacity.
pub struct CapacityProbe {
    severity: Severity,
}

impl CapacityProbe {
    pub fn new(severity: Severity) -> Self {
        Self { severity }
    }
}

#[async_trait]
impl Probe for CapacityProbe {
    fn id(&self) -> String {
        "capacity:classes".to_string()
    }

    fn table(&self) -> &str {
        TABLE_CLASSES
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let classes = ctx
            .select(
                &Query::table(TABLE_CLASSES)
                    .fields(&["id", "name", "capacity"])
                    .filter(Predicate::is_not_null("capacity"))
                    .limit(ctx.config().orphan_sample_limit),
            )
            .await?;

        let ids = distinct_keys(&classes, "id");
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let enrollments = ctx
            .select(
                &Query::table(TABLE_ENROLLMENTS)
                    .fields(&["class_id"])
                    .filter(Predicate::eq("status", SEAT_STATUS))
                    .filter(Predicate::is_in("class_id", ids.values().cloned()))
                    .limit(ctx.config().enrollment_scan_limit),
            )
            .await?;

        let mut seats: HashMap<String, u64> = HashMap::new();
        for row in &enrollments {
            if let Some(class_id) = row.text("class_id") {
                *seats.entry(class_id).or_insert(0) += 1;
            }
        }

        let over: Vec<serde_json::Value> = classes
            .iter()
            .filter_map(|class| {
                let id = class.text("id")?;
                let capacity = class.get_i64("capacity")?;
                let enrolled = seats.get(&id).copied().unwrap_or(0);
                (enrolled as i64 > capacity).then(|| {
                    json!({
                        "classId": id,
                        "name": class.text("name"),
                        "capacity": capacity,
                        "enrolled": enrolled,
                    })
                })
            })
            .collect();

        if over.is_empty() {
            return Ok(Vec::new());
        }

        let count = over.len() as u64;
        Ok(vec![Issue::new(
            IssueCategory::CapacityExceeded,
            self.severity,
            TABLE_CLASSES,
            format!(
                "{} more enrolled students than seats",
                plural(count, "class has", "classes have")
            ),
        )
        .with_details(json!({
            "classes": over.iter().take(MAX_DETAIL_ITEMS).collect::<Vec<_>>(),
            "truncated": enrollments.len() >= ctx.config().enrollment_scan_limit,
        }))
        .with_affected_count(count)])
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
    async fn test_over_capacity_class() {
        let enrollment = |class: &str, status: &str| {
            Row::new().with("class_id", class).with("status", status)
        };
        let store = InMemoryDataStore::new()
            .with_table(
                "classes",
                vec![
                    Row::from(json!({"id": "c1", "name": "7A", "capacity": 2})),
                    Row::from(json!({"id": "c2", "name": "7B", "capacity": 30})),
                ],
            )
            .with_table(
                "enrollments",
                vec![
                    enrollment("c1", "enrolled"),
                    enrollment("c1", "enrolled"),
                    enrollment("c1", "enrolled"),
                    enrollment("c1", "withdrawn"),
                    enrollment("c2", "enrolled"),
                ],
            );
        let run = RunContext::new(HealthConfig::default(), "test");
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let issues = CapacityProbe::new(Severity::Warning).inspect(&ctx).await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].affected_count, Some(1));
        assert_eq!(issues[0].details["classes"][0]["classId"], "c1");
        assert_eq!(issues[0].details["classes"][0]["enrolled"], 3);
    }
}
