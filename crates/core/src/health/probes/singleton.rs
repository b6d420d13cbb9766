//! Singleton invariant: exactly one row carries an "active" flag.

use async_trait::async_trait;
use serde_json::json;

use crate::datastore::{Predicate, Query, Row};
use crate::errors::Result;
use crate::health::model::{Issue, IssueCategory, Severity};
use crate::health::traits::{Probe, ProbeContext};

/// Evaluates the active rows found for `table`.
///
/// Zero rows and more than one row are both critical; exactly one is fine.
pub fn evaluate_singleton(table: &str, noun: &str, label_column: &str, active: &[Row]) -> Option<Issue> {
    match active.len() {
        1 => None,
        0 => Some(
            Issue::new(
                IssueCategory::ActivePeriod,
                Severity::Critical,
                table,
                format!("No {} is marked active", noun),
            )
            .with_affected_count(0),
        ),
        n => {
            let names: Vec<String> = active
                .iter()
                .map(|r| {
                    r.text(label_column)
                        .or_else(|| r.text("id"))
                        .unwrap_or_default()
                })
                .collect();
            Some(
                Issue::new(
                    IssueCategory::ActivePeriod,
                    Severity::Critical,
                    table,
                    format!("{} {}s are marked active: {}", n, noun, names.join(", ")),
                )
                .with_details(json!({
                    "activeIds": active.iter().filter_map(|r| r.text("id")).collect::<Vec<_>>(),
                    "names": names,
                }))
                .with_affected_count(n as u64),
            )
        }
    }
}

pub struct SingletonProbe {
    table: String,
    flag_column: String,
    label_column: String,
    noun: String,
}

impl SingletonProbe {
    pub fn new(table: &str, flag_column: &str, label_column: &str, noun: &str) -> Self {
        Self {
            table: table.to_string(),
            flag_column: flag_column.to_string(),
            label_column: label_column.to_string(),
            noun: noun.to_string(),
        }
    }
}

#[async_trait]
impl Probe for SingletonProbe {
    fn id(&self) -> String {
        format!("singleton:{}.{}", self.table, self.flag_column)
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let active = ctx
            .select(
                &Query::table(&self.table)
                    .fields(&["id", self.label_column.as_str()])
                    .filter(Predicate::eq(&self.flag_column, true))
                    .order_by("id", crate::datastore::SortDirection::Asc)
                    .limit(ctx.config().active_scan_limit),
            )
            .await?;

        Ok(evaluate_singleton(&self.table, &self.noun, &self.label_column, &active)
            .into_iter()
            .collect())
    }
}
