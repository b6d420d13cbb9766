//! Timetable conflict probe.
//!
//! Slots are grouped by academic period, weekday and a shared resource
//! (teacher, room or class). Two slots of a group conflict when their
//! half-open `[start, end)` intervals overlap.

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;

use super::plural;
use crate::datastore::{Predicate, Query, Row, SortDirection};
use crate::errors::Result;
use crate::constants::TABLE_SCHEDULES;
use crate::health::model::{Issue, IssueCategory, Severity, MAX_DETAIL_ITEMS};
use crate::health::traits::{Probe, ProbeContext};

/// A resource two slots must not share at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleResource {
    Teacher,
    Room,
    Class,
}

impl ScheduleResource {
    pub const ALL: [ScheduleResource; 3] = [
        ScheduleResource::Teacher,
        ScheduleResource::Room,
        ScheduleResource::Class,
    ];

    fn column(&self) -> &'static str {
        match self {
            ScheduleResource::Teacher => "teacher_id",
            ScheduleResource::Room => "room",
            ScheduleResource::Class => "class_id",
        }
    }

    fn severity(&self) -> Severity {
        match self {
            ScheduleResource::Teacher => Severity::Critical,
            ScheduleResource::Room | ScheduleResource::Class => Severity::Warning,
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            ScheduleResource::Teacher => "teacher",
            ScheduleResource::Room => "room",
            ScheduleResource::Class => "class",
        }
    }
}

/// One timetable slot, times as `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub id: String,
    pub start: String,
    pub end: String,
}

/// Every overlapping pair within one group, ordered by start time.
pub fn find_overlaps(slots: &[TimeSlot]) -> Vec<(String, String)> {
    let mut sorted: Vec<&TimeSlot> = slots.iter().collect();
    sorted.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));

    let mut pairs = Vec::new();
    for (i, a) in sorted.iter().enumerate() {
        for b in &sorted[i + 1..] {
            // sorted by start: nothing later can overlap `a` once b starts after it ends
            if b.start >= a.end {
                break;
            }
            pairs.push((a.id.clone(), b.id.clone()));
        }
    }
    pairs
}

pub struct ScheduleConflictProbe;

impl ScheduleConflictProbe {
    pub fn new() -> Self {
        Self
    }

    fn conflicts(rows: &[Row], resource: ScheduleResource) -> Vec<serde_json::Value> {
        let mut groups: BTreeMap<(String, String, String), Vec<TimeSlot>> = BTreeMap::new();
        for row in rows {
            let (Some(id), Some(day), Some(owner), Some(start), Some(end)) = (
                row.text("id"),
                row.text("day_of_week"),
                row.text(resource.column()),
                row.text("start_time"),
                row.text("end_time"),
            ) else {
                continue;
            };
            if owner.trim().is_empty() || start >= end {
                continue;
            }
            let period = row.text("academic_period_id").unwrap_or_default();
            groups
                .entry((period, day, owner))
                .or_default()
                .push(TimeSlot { id, start, end });
        }

        groups
            .into_iter()
            .flat_map(|((_, day, owner), slots)| {
                find_overlaps(&slots)
                    .into_iter()
                    .map(move |(a, b)| {
                        json!({ "owner": owner.clone(), "dayOfWeek": day.clone(), "slots": [a, b] })
                    })
            })
            .collect()
    }
}

impl Default for ScheduleConflictProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for ScheduleConflictProbe {
    fn id(&self) -> String {
        "schedule_conflicts".to_string()
    }

    fn table(&self) -> &str {
        TABLE_SCHEDULES
    }

    async fn inspect(&self, ctx: &ProbeContext<'_>) -> Result<Vec<Issue>> {
        let limit = ctx.config().schedule_scan_limit;
        let rows = ctx
            .select(
                &Query::table(TABLE_SCHEDULES)
                    .fields(&[
                        "id",
                        "class_id",
                        "teacher_id",
                        "room",
                        "day_of_week",
                        "start_time",
                        "end_time",
                        "academic_period_id",
                    ])
                    .filter(Predicate::is_not_null("start_time"))
                    .filter(Predicate::is_not_null("end_time"))
                    .order_by("id", SortDirection::Asc)
                    .limit(limit),
            )
            .await?;

        let mut issues = Vec::new();
        for resource in ScheduleResource::ALL {
            let conflicts = Self::conflicts(&rows, resource);
            if conflicts.is_empty() {
                continue;
            }
            let count = conflicts.len() as u64;
            issues.push(
                Issue::new(
                    IssueCategory::ScheduleConflict,
                    resource.severity(),
                    TABLE_SCHEDULES,
                    format!(
                        "{} double-booked",
                        plural(
                            count,
                            &format!("pair of slots has a {}", resource.noun()),
                            &format!("pairs of slots have a {}", resource.noun())
                        )
                    ),
                )
                .with_details(json!({
                    "resource": resource.noun(),
                    "conflicts": conflicts.iter().take(MAX_DETAIL_ITEMS).collect::<Vec<_>>(),
                    "scannedSlots": rows.len(),
                    "truncated": rows.len() >= limit,
                }))
                .with_affected_count(count),
            );
        }
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::{Deadline, InMemoryDataStore};
    use crate::health::model::HealthConfig;
    use crate::health::traits::RunContext;
    use std::time::Duration;

    fn slot(id: &str, start: &str, end: &str) -> TimeSlot {
        TimeSlot {
            id: id.to_string(),
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    #[test]
    fn test_find_overlaps() {
        let slots = [
            slot("a", "08:00", "09:00"),
            slot("b", "09:00", "10:00"),
            slot("c", "09:30", "10:30"),
            slot("d", "08:30", "08:45"),
        ];
        let pairs = find_overlaps(&slots);
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "d".to_string()),
                ("b".to_string(), "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_adjacent_slots_do_not_overlap() {
        let slots = [slot("a", "08:00", "09:00"), slot("b", "09:00", "10:00")];
        assert!(find_overlaps(&slots).is_empty());
    }

    #[tokio::test]
    async fn test_probe_groups_by_resource_and_day() {
        let row = |id: &str, teacher: &str, room: &str, class: &str, day: i64, start: &str, end: &str| {
            Row::from(json!({
                "id": id, "teacher_id": teacher, "room": room, "class_id": class,
                "day_of_week": day, "start_time": start, "end_time": end,
                "academic_period_id": "p1"
            }))
        };
        let store = InMemoryDataStore::new().with_table(
            "schedules",
            vec![
                row("sc1", "t1", "101", "c1", 1, "08:00", "09:00"),
                row("sc2", "t1", "102", "c2", 1, "08:30", "09:30"),
                row("sc3", "t2", "101", "c3", 1, "08:15", "08:45"),
                // same teacher, different weekday
                row("sc4", "t1", "103", "c4", 2, "08:00", "09:00"),
            ],
        );
        let run = RunContext::new(HealthConfig::default(), "test");
        let ctx = ProbeContext::new(&store, &run, Deadline::after(Duration::from_secs(5)));

        let issues = ScheduleConflictProbe::new().inspect(&ctx).await.unwrap();
        assert_eq!(issues.len(), 2);

        let teacher = &issues[0];
        assert_eq!(teacher.severity, Severity::Critical);
        assert_eq!(teacher.affected_count, Some(1));
        assert_eq!(teacher.details["conflicts"][0]["slots"], json!(["sc1", "sc2"]));

        let room = &issues[1];
        assert_eq!(room.severity, Severity::Warning);
        assert_eq!(room.details["conflicts"][0]["slots"], json!(["sc1", "sc3"]));
    }
}
