//! Configuration completeness probe over the key/value settings table.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;

use crate::constants::TABLE_SCHOOL_SETTINGS;
use crate::datastore::{Predicate, Query};
use crate::errors::Result;
use crate::health::model::{Issue, IssueCategory, Severity};
use crate::health::traits::{Probe, ProbeContext};

pub struct SettingsCompletenessProbe {
    required: Vec<&'static str>,
}

impl SettingsCompletenessProbe {
    pub fn new(required: &[&'static str]) -> Self {
        Self {
            required: required.to_vec(),
        }
    }
}

#[async_trait]
impl Probe for SettingsCompletenessProbe {
    fn id(&self) -> String {
        "configuration:school_settings".to_string()
    }

    fn table(&self) -> &str {
        TABLE_SCHOOL_SETTINGS
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let rows = ctx
            .select(
                &Query::table(TABLE_SCHOOL_SETTINGS)
                    .fields(&["key", "value"])
                    .filter(Predicate::is_in("key", self.required.iter().copied())),
            )
            .await?;

        let configured: HashSet<String> = rows
            .iter()
            .filter(|r| r.text("value").is_some_and(|v| !v.trim().is_empty()))
            .filter_map(|r| r.text("key"))
            .collect();
        let missing: Vec<&str> = self
            .required
            .iter()
            .copied()
            .filter(|k| !configured.contains(*k))
            .collect();

        if missing.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![Issue::new(
            IssueCategory::Configuration,
            Severity::Warning,
            TABLE_SCHOOL_SETTINGS,
            format!("Required school settings not configured: {}", missing.join(", ")),
        )
        .with_details(json!({ "missingKeys": missing }))
        .with_affected_count(missing.len() as u64)])
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
    async fn test_missing_and_blank_settings() {
        let setting = |k: &str, v: &str| Row::new().with("key", k).with("value", v);
        let store = InMemoryDataStore::new().with_table(
            "school_settings",
            vec![
                setting("school_name", "Northside High"),
                setting("timezone", "  "),
                setting("theme", "dark"),
            ],
        );
        let run = RunContext::new(HealthConfig::default(), "test");
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let probe = SettingsCompletenessProbe::new(&["school_name", "timezone", "grading_scale"]);
        let issues = probe.inspect(&ctx).await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].details["missingKeys"], json!(["timezone", "grading_scale"]));
        assert_eq!(issues[0].affected_count, Some(2));
    }
}
