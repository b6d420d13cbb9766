//! Health engine domain models.
//!
//! This module contains the core data structures for the diagnostic engine:
//! - Severity levels and categories for issues
//! - Per-checker results and the run summary derived from them
//! - The persisted health run record and the outcome returned to callers
//! - Configuration for thresholds and sampling caps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::errors::HealthError;

/// Upper bound on identifiers listed in an issue's details.
pub const MAX_DETAIL_ITEMS: usize = 20;

// =============================================================================
// Severity
// =============================================================================

/// Severity levels for issues.
///
/// Ordered from lowest to highest: Info < Warning < Critical.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Issue Category
// =============================================================================

/// Closed taxonomy every probe finding is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    TableAccess,
    EmptyTable,
    OrphanedRecords,
    ConstraintViolation,
    MissingRequiredField,
    DuplicateRecords,
    InvalidEnumeration,
    DateSanity,
    FieldOrder,
    InvalidFormat,
    DenormalizedMismatch,
    ActivePeriod,
    ScheduleConflict,
    CapacityExceeded,
    WorkflowInconsistency,
    DataFreshness,
    RecentActivity,
    InactivityRatio,
    VolumeGrowth,
    Configuration,
    Retention,
    /// The probe itself could not run.
    ProbeFailure,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::TableAccess => "table_access",
            IssueCategory::EmptyTable => "empty_table",
            IssueCategory::OrphanedRecords => "orphaned_records",
            IssueCategory::ConstraintViolation => "constraint_violation",
            IssueCategory::MissingRequiredField => "missing_required_field",
            IssueCategory::DuplicateRecords => "duplicate_records",
            IssueCategory::InvalidEnumeration => "invalid_enumeration",
            IssueCategory::DateSanity => "date_sanity",
            IssueCategory::FieldOrder => "field_order",
            IssueCategory::InvalidFormat => "invalid_format",
            IssueCategory::DenormalizedMismatch => "denormalized_mismatch",
            IssueCategory::ActivePeriod => "active_period",
            IssueCategory::ScheduleConflict => "schedule_conflict",
            IssueCategory::CapacityExceeded => "capacity_exceeded",
            IssueCategory::WorkflowInconsistency => "workflow_inconsistency",
            IssueCategory::DataFreshness => "data_freshness",
            IssueCategory::RecentActivity => "recent_activity",
            IssueCategory::InactivityRatio => "inactivity_ratio",
            IssueCategory::VolumeGrowth => "volume_growth",
            IssueCategory::Configuration => "configuration",
            IssueCategory::Retention => "retention",
            IssueCategory::ProbeFailure => "probe_failure",
        }
    }
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Issue
// =============================================================================

/// A single finding produced by a probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub category: IssueCategory,

    pub severity: Severity,

    /// Human-readable description of the finding
    pub message: String,

    /// Structured evidence (sampled ids, counts, thresholds)
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,

    /// The table the finding is about
    pub affected_table: String,

    /// Number of rows affected, when the probe can tell
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_count: Option<u64>,
}

impl Issue {
    pub fn new(
        category: IssueCategory,
        severity: Severity,
        affected_table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            message: message.into(),
            details: Value::Null,
            affected_table: affected_table.into(),
            affected_count: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_affected_count(mut self, count: u64) -> Self {
        self.affected_count = Some(count);
        self
    }

    /// Info-level finding describing a probe that could not complete.
    pub fn probe_failure(probe_id: &str, table: &str, error: &str) -> Self {
        Self::new(
            IssueCategory::ProbeFailure,
            Severity::Info,
            table,
            format!("Check '{}' could not complete", probe_id),
        )
        .with_details(serde_json::json!({ "probe": probe_id, "error": error }))
    }
}

// =============================================================================
// Checker
// =============================================================================

/// The four checkers the orchestrator dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckerKind {
    /// Structural, referential, constraint and duplicate probes
    Integrity,
    DataValidation,
    BusinessRules,
    OperationalHealth,
}

impl CheckerKind {
    pub const ALL: [CheckerKind; 4] = [
        CheckerKind::Integrity,
        CheckerKind::DataValidation,
        CheckerKind::BusinessRules,
        CheckerKind::OperationalHealth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckerKind::Integrity => "integrity",
            CheckerKind::DataValidation => "data_validation",
            CheckerKind::BusinessRules => "business_rules",
            CheckerKind::OperationalHealth => "operational_health",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckerKind::Integrity => "Data Integrity",
            CheckerKind::DataValidation => "Data Validation",
            CheckerKind::BusinessRules => "Business Rules",
            CheckerKind::OperationalHealth => "Operational Health",
        }
    }
}

impl std::fmt::Display for CheckerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status reported for one checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckerStatus {
    Healthy,
    Info,
    Warning,
    Critical,
}

impl CheckerStatus {
    /// Maps the highest issue severity to a status; no issues means healthy.
    pub fn from_issues(issues: &[Issue]) -> Self {
        match issues.iter().map(|i| i.severity).max() {
            Some(Severity::Critical) => CheckerStatus::Critical,
            Some(Severity::Warning) => CheckerStatus::Warning,
            Some(Severity::Info) => CheckerStatus::Info,
            None => CheckerStatus::Healthy,
        }
    }
}

/// Result of one checker.
///
/// `Failed` means the checker could not execute at all; it carries no issues
/// and reports a critical status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "CheckerResultRecord", from = "CheckerResultRecord")]
pub enum CheckerResult {
    Completed {
        issues: Vec<Issue>,
        execution_time_ms: u64,
    },
    Failed {
        error: String,
        execution_time_ms: u64,
    },
}

impl CheckerResult {
    pub fn completed(issues: Vec<Issue>, execution_time_ms: u64) -> Self {
        CheckerResult::Completed {
            issues,
            execution_time_ms,
        }
    }

    pub fn failed(error: impl Into<String>, execution_time_ms: u64) -> Self {
        CheckerResult::Failed {
            error: error.into(),
            execution_time_ms,
        }
    }

    pub fn status(&self) -> CheckerStatus {
        match self {
            CheckerResult::Completed { issues, .. } => CheckerStatus::from_issues(issues),
            CheckerResult::Failed { .. } => CheckerStatus::Critical,
        }
    }

    pub fn issues(&self) -> &[Issue] {
        match self {
            CheckerResult::Completed { issues, .. } => issues,
            CheckerResult::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CheckerResult::Completed { .. } => None,
            CheckerResult::Failed { error, .. } => Some(error),
        }
    }

    pub fn execution_time_ms(&self) -> u64 {
        match self {
            CheckerResult::Completed {
                execution_time_ms, ..
            }
            | CheckerResult::Failed {
                execution_time_ms, ..
            } => *execution_time_ms,
        }
    }
}

/// Flat serialized shape of a checker result (the `issues_detail` tree).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckerResultRecord {
    status: CheckerStatus,
    #[serde(default)]
    issues: Vec<Issue>,
    execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<CheckerResult> for CheckerResultRecord {
    fn from(result: CheckerResult) -> Self {
        let status = result.status();
        match result {
            CheckerResult::Completed {
                issues,
                execution_time_ms,
            } => Self {
                status,
                issues,
                execution_time_ms,
                error: None,
            },
            CheckerResult::Failed {
                error,
                execution_time_ms,
            } => Self {
                status,
                issues: Vec::new(),
                execution_time_ms,
                error: Some(error),
            },
        }
    }
}

impl From<CheckerResultRecord> for CheckerResult {
    // The stored status is ignored; it is always re-derived.
    fn from(record: CheckerResultRecord) -> Self {
        match record.error {
            Some(error) => CheckerResult::failed(error, record.execution_time_ms),
            None => CheckerResult::completed(record.issues, record.execution_time_ms),
        }
    }
}

// =============================================================================
// Run Summary
// =============================================================================

/// Overall status of a run. Info-only findings stay healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Warning,
    Critical,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Warning => "warning",
            OverallStatus::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "healthy" => Some(OverallStatus::Healthy),
            "warning" => Some(OverallStatus::Warning),
            "critical" => Some(OverallStatus::Critical),
            _ => None,
        }
    }
}

/// Severity tallies over every issue of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_issues: u64,
    pub critical_count: u64,
    pub warning_count: u64,
    pub info_count: u64,
    pub overall_status: OverallStatus,
}

impl RunSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a CheckerResult>) -> Self {
        let (mut critical, mut warning, mut info) = (0u64, 0u64, 0u64);
        for issue in results.into_iter().flat_map(CheckerResult::issues) {
            match issue.severity {
                Severity::Critical => critical += 1,
                Severity::Warning => warning += 1,
                Severity::Info => info += 1,
            }
        }
        Self::from_counts(critical, warning, info)
    }

    pub fn from_counts(critical_count: u64, warning_count: u64, info_count: u64) -> Self {
        let overall_status = if critical_count > 0 {
            OverallStatus::Critical
        } else if warning_count > 0 {
            OverallStatus::Warning
        } else {
            OverallStatus::Healthy
        };
        Self {
            total_issues: critical_count + warning_count + info_count,
            critical_count,
            warning_count,
            info_count,
            overall_status,
        }
    }

    pub fn empty() -> Self {
        Self::from_counts(0, 0, 0)
    }
}

// =============================================================================
// Health Run
// =============================================================================

/// Persisted audit record of one orchestration. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRun {
    pub id: String,
    pub checked_at: DateTime<Utc>,
    /// Opaque identity of whoever triggered the run, stored verbatim
    pub checked_by: String,
    pub total_issues: u64,
    pub critical_count: u64,
    pub warning_count: u64,
    pub info_count: u64,
    pub issues_detail: BTreeMap<CheckerKind, CheckerResult>,
    pub execution_time_ms: u64,
    pub status: OverallStatus,
}

impl HealthRun {
    /// Builds a new run record with a fresh time-ordered id.
    pub fn new(
        checked_by: impl Into<String>,
        checked_at: DateTime<Utc>,
        issues_detail: BTreeMap<CheckerKind, CheckerResult>,
        execution_time_ms: u64,
    ) -> Self {
        let summary = RunSummary::from_results(issues_detail.values());
        Self {
            id: Uuid::now_v7().to_string(),
            checked_at,
            checked_by: checked_by.into(),
            total_issues: summary.total_issues,
            critical_count: summary.critical_count,
            warning_count: summary.warning_count,
            info_count: summary.info_count,
            issues_detail,
            execution_time_ms,
            status: summary.overall_status,
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total_issues: self.total_issues,
            critical_count: self.critical_count,
            warning_count: self.warning_count,
            info_count: self.info_count,
            overall_status: self.status,
        }
    }
}

// =============================================================================
// Run Outcome
// =============================================================================

/// What `run_full_check` hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    /// False only when the store was unreachable before dispatch or the run
    /// record could not be persisted
    pub success: bool,
    /// Id of the persisted run, when persistence succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub summary: RunSummary,
    pub results: BTreeMap<CheckerKind, CheckerResult>,
    pub execution_time_ms: u64,
    pub errors: Vec<String>,
}

impl RunOutcome {
    /// Outcome for a run that never dispatched any checker.
    pub fn aborted(error: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            run_id: None,
            summary: RunSummary::empty(),
            results: BTreeMap::new(),
            execution_time_ms,
            errors: vec![error.into()],
        }
    }
}

// =============================================================================
// Health Config
// =============================================================================

/// Upper bound for every `*_days` window.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Upper bound for every row cap.
pub const MAX_ROW_CAP: usize = 100_000;

/// Upper bound for `probe_timeout_ms`.
pub const MAX_PROBE_TIMEOUT_MS: u64 = 600_000;

/// Upper bound for `max_student_age_years`.
pub const MAX_STUDENT_AGE_YEARS: i64 = 150;

/// Thresholds and sampling caps for the probes.
///
/// Caps bound the cost of each probe at the expense of completeness; they are
/// not exhaustive scans of large tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthConfig {
    /// Deadline for a single probe, including all its queries (default: 10s)
    pub probe_timeout_ms: u64,

    /// Dependent rows sampled per orphan / denormalization probe (default: 200)
    pub orphan_sample_limit: usize,

    /// Values scanned per duplicate / format / field-order probe (default: 1000)
    pub duplicate_scan_limit: usize,

    /// Violating rows fetched per range / enumeration / date probe (default: 500)
    pub violation_sample_limit: usize,

    /// Active rows fetched by singleton probes (default: 50)
    pub active_scan_limit: usize,

    /// Timetable slots scanned for conflicts (default: 1000)
    pub schedule_scan_limit: usize,

    /// Enrollment rows tallied for capacity checks (default: 5000)
    pub enrollment_scan_limit: usize,

    /// Days without new records before data is reported stale (default: 90)
    pub stale_after_days: i64,

    /// Window for the recent-activity probe (default: 7)
    pub recent_activity_days: i64,

    /// Inactive share above which a warning is raised (default: 0.5)
    pub inactive_ratio_threshold: f64,

    /// Window compared by the volume-growth probe (default: 30)
    pub growth_window_days: i64,

    /// Window-over-window growth factor reported as unusual (default: 3.0)
    pub growth_ratio_threshold: f64,

    /// Stored health runs above which retention is flagged (default: 1000)
    pub run_retention_threshold: u64,

    /// Birth dates older than this many years are implausible (default: 100)
    pub max_student_age_years: i64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 10_000,
            orphan_sample_limit: 200,
            duplicate_scan_limit: 1000,
            violation_sample_limit: 500,
            active_scan_limit: 50,
            schedule_scan_limit: 1000,
            enrollment_scan_limit: 5000,
            stale_after_days: 90,
            recent_activity_days: 7,
            inactive_ratio_threshold: 0.5,
            growth_window_days: 30,
            growth_ratio_threshold: 3.0,
            run_retention_threshold: 1000,
            max_student_age_years: 100,
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> Result<(), HealthError> {
        if !(1..=MAX_PROBE_TIMEOUT_MS).contains(&self.probe_timeout_ms) {
            return Err(HealthError::InvalidConfig(format!(
                "probe_timeout_ms must be in 1..={}",
                MAX_PROBE_TIMEOUT_MS
            )));
        }
        let caps = [
            ("orphan_sample_limit", self.orphan_sample_limit),
            ("duplicate_scan_limit", self.duplicate_scan_limit),
            ("violation_sample_limit", self.violation_sample_limit),
            ("active_scan_limit", self.active_scan_limit),
            ("schedule_scan_limit", self.schedule_scan_limit),
            ("enrollment_scan_limit", self.enrollment_scan_limit),
        ];
        if let Some((name, _)) = caps
            .iter()
            .find(|(_, cap)| !(1..=MAX_ROW_CAP).contains(cap))
        {
            return Err(HealthError::InvalidConfig(format!(
                "{} must be in 1..={}",
                name, MAX_ROW_CAP
            )));
        }
        let windows = [
            ("stale_after_days", self.stale_after_days),
            ("recent_activity_days", self.recent_activity_days),
            ("growth_window_days", self.growth_window_days),
        ];
        if let Some((name, _)) = windows
            .iter()
            .find(|(_, days)| !(1..=MAX_WINDOW_DAYS).contains(days))
        {
            return Err(HealthError::InvalidConfig(format!(
                "{} must be in 1..={}",
                name, MAX_WINDOW_DAYS
            )));
        }
        if !(1..=MAX_STUDENT_AGE_YEARS).contains(&self.max_student_age_years) {
            return Err(HealthError::InvalidConfig(format!(
                "max_student_age_years must be in 1..={}",
                MAX_STUDENT_AGE_YEARS
            )));
        }
        if !(self.inactive_ratio_threshold > 0.0 && self.inactive_ratio_threshold <= 1.0) {
            return Err(HealthError::InvalidConfig(
                "inactive_ratio_threshold must be in (0, 1]".to_string(),
            ));
        }
        if self.growth_ratio_threshold <= 1.0 {
            return Err(HealthError::InvalidConfig(
                "growth_ratio_threshold must be > 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
