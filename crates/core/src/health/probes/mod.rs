//! Probe implementations.
//!
//! Each probe asks one question of the DataStore:
//! - Structural: table reachability and emptiness
//! - Referential: orphaned foreign keys
//! - Constraint: numeric ranges and required fields
//! - Duplicates over single or composite keys
//! - Enumerations, date sanity, field order and formats
//! - Denormalized copies drifting from their source
//! - Business rules: active period, timetable conflicts, capacity, workflow
//! - Operational signals: freshness, activity, inactivity, growth, settings

pub mod capacity;
pub mod constraint;
pub mod dates;
pub mod denormalized;
pub mod duplicate;
pub mod enumeration;
pub mod format;
pub mod freshness;
pub mod orphan;
pub mod schedule;
pub mod settings;
pub mod singleton;
pub mod structural;
pub mod volume;
pub mod workflow;

pub use capacity::CapacityProbe;
pub use constraint::{RangeProbe, RequiredFieldProbe};
pub use dates::{DateSanityProbe, FieldOrderProbe};
pub use denormalized::DenormalizedCopyProbe;
pub use duplicate::{find_duplicates, DuplicateGroup, DuplicateProbe};
pub use enumeration::EnumerationProbe;
pub use format::EmailFormatProbe;
pub use freshness::{FreshnessProbe, RecentActivityProbe};
pub use orphan::OrphanProbe;
pub use schedule::{find_overlaps, ScheduleConflictProbe, ScheduleResource, TimeSlot};
pub use settings::SettingsCompletenessProbe;
pub use singleton::{evaluate_singleton, SingletonProbe};
pub use structural::{EmptyTableProbe, TableAccessProbe};
pub use volume::{growth_ratio, InactivityRatioProbe, RunRetentionProbe, VolumeGrowthProbe};
pub use workflow::{DepartedStudentEnrollmentProbe, StateRuleProbe};

use std::collections::BTreeMap;

use crate::datastore::{Row, Value};

/// Ids of the given rows, capped for issue details.
pub(crate) fn sample_ids(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.text("id"))
        .take(super::model::MAX_DETAIL_ITEMS)
        .collect()
}

/// Distinct non-null values of `column`, keyed by their text form and
/// keeping the original JSON type for binding.
pub(crate) fn distinct_keys(rows: &[Row], column: &str) -> BTreeMap<String, Value> {
    rows.iter()
        .filter_map(|r| {
            let value = r.get(column)?;
            let text = crate::datastore::json_to_text(value)?;
            Some((text, Value::from_json(value)))
        })
        .collect()
}

/// `"1 student"` / `"3 students"` style counters for messages.
pub(crate) fn plural(count: u64, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("1 {}", singular)
    } else {
        format!("{} {}", count, plural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_distinct_keys_preserve_type() {
        let rows = vec![
            Row::from(json!({"class_id": "c1"})),
            Row::from(json!({"class_id": "c1"})),
            Row::from(json!({"class_id": 7})),
            Row::from(json!({"class_id": null})),
        ];
        let keys = distinct_keys(&rows, "class_id");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.get("c1"), Some(&Value::Text("c1".to_string())));
        assert_eq!(keys.get("7"), Some(&Value::Integer(7)));
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "row", "rows"), "1 row");
        assert_eq!(plural(4, "row", "rows"), "4 rows");
    }
}
