//! Database model for persisted health runs.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use std::collections::BTreeMap;

use scholaris_core::health::{CheckerKind, CheckerResult, HealthRun, OverallStatus};

use crate::errors::StorageError;

/// Database model for health runs
#[derive(Queryable, Identifiable, Insertable, Selectable, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::health_runs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct HealthRunDB {
    pub id: String,
    pub checked_at: String,
    pub checked_by: String,
    pub total_issues: i64,
    pub critical_count: i64,
    pub warning_count: i64,
    pub info_count: i64,
    pub issues_detail: String,
    pub execution_time: i64,
    pub status: String,
}

impl TryFrom<&HealthRun> for HealthRunDB {
    type Error = StorageError;

    fn try_from(run: &HealthRun) -> Result<Self, Self::Error> {
        Ok(Self {
            id: run.id.clone(),
            checked_at: run.checked_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            checked_by: run.checked_by.clone(),
            total_issues: run.total_issues as i64,
            critical_count: run.critical_count as i64,
            warning_count: run.warning_count as i64,
            info_count: run.info_count as i64,
            issues_detail: serde_json::to_string(&run.issues_detail)?,
            execution_time: run.execution_time_ms as i64,
            status: run.status.as_str().to_string(),
        })
    }
}

impl TryFrom<HealthRunDB> for HealthRun {
    type Error = StorageError;

    fn try_from(db: HealthRunDB) -> Result<Self, Self::Error> {
        let checked_at = DateTime::parse_from_rfc3339(&db.checked_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                StorageError::SerializationError(format!(
                    "health run {} has an invalid checked_at '{}': {}",
                    db.id, db.checked_at, e
                ))
            })?;
        let status = OverallStatus::parse(&db.status).ok_or_else(|| {
            StorageError::SerializationError(format!(
                "health run {} has an unknown status '{}'",
                db.id, db.status
            ))
        })?;
        let issues_detail: BTreeMap<CheckerKind, CheckerResult> =
            serde_json::from_str(&db.issues_detail)?;

        Ok(Self {
            id: db.id,
            checked_at,
            checked_by: db.checked_by,
            total_issues: db.total_issues.max(0) as u64,
            critical_count: db.critical_count.max(0) as u64,
            warning_count: db.warning_count.max(0) as u64,
            info_count: db.info_count.max(0) as u64,
            issues_detail,
            execution_time_ms: db.execution_time.max(0) as u64,
            status,
        })
    }
}
