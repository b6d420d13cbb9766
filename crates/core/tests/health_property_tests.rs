//! Property-based integration tests for the health engine.
//!
//! These tests check the aggregation invariants over arbitrary checker
//! results, plus the pure detection helpers, using `proptest`.

use chrono::Utc;
use proptest::prelude::*;
use std::collections::BTreeMap;

use scholaris_core::health::model::{MAX_ROW_CAP, MAX_WINDOW_DAYS};
use scholaris_core::health::probes::{find_duplicates, find_overlaps, TimeSlot};
use scholaris_core::health::{
    CheckerKind, CheckerResult, CheckerStatus, HealthConfig, HealthRun, Issue, IssueCategory,
    OverallStatus, RunContext, RunSummary, Severity,
};

// =============================================================================
// Generators
// =============================================================================

fn arb_severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Info),
        Just(Severity::Warning),
        Just(Severity::Critical),
    ]
}

fn arb_category() -> impl Strategy<Value = IssueCategory> {
    prop_oneof![
        Just(IssueCategory::OrphanedRecords),
        Just(IssueCategory::DuplicateRecords),
        Just(IssueCategory::DateSanity),
        Just(IssueCategory::ScheduleConflict),
        Just(IssueCategory::DataFreshness),
        Just(IssueCategory::ProbeFailure),
    ]
}

fn arb_issue() -> impl Strategy<Value = Issue> {
    (
        arb_category(),
        arb_severity(),
        "[a-z_]{3,12}",  // table
        "[a-z ]{5,40}",  // message
        proptest::option::of(0u64..500),
    )
        .prop_map(|(category, severity, table, message, count)| {
            let issue = Issue::new(category, severity, &table, message);
            match count {
                Some(n) => issue.with_affected_count(n),
                None => issue,
            }
        })
}

fn arb_checker_result() -> impl Strategy<Value = CheckerResult> {
    prop_oneof![
        4 => (proptest::collection::vec(arb_issue(), 0..15), 0u64..5000)
            .prop_map(|(issues, ms)| CheckerResult::completed(issues, ms)),
        1 => ("[a-z ]{5,30}", 0u64..5000).prop_map(|(error, ms)| CheckerResult::failed(error, ms)),
    ]
}

fn arb_results() -> impl Strategy<Value = BTreeMap<CheckerKind, CheckerResult>> {
    proptest::collection::vec(arb_checker_result(), 4).prop_map(|results| {
        CheckerKind::ALL.into_iter().zip(results).collect()
    })
}

/// `HH:MM` between 07:00 and 16:59.
fn arb_time() -> impl Strategy<Value = String> {
    (7u32..17, 0u32..60).prop_map(|(h, m)| format!("{:02}:{:02}", h, m))
}

fn arb_slots() -> impl Strategy<Value = Vec<TimeSlot>> {
    proptest::collection::vec((arb_time(), arb_time()), 0..10).prop_map(|pairs| {
        pairs
            .into_iter()
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, (a, b))| {
                let (start, end) = if a < b { (a, b) } else { (b, a) };
                TimeSlot {
                    id: format!("sc{}", i),
                    start,
                    end,
                }
            })
            .collect()
    })
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// The total is always the sum of the per-severity counts, and each count
    /// matches the issues actually carried by completed checkers.
    #[test]
    fn prop_summary_counts_are_exact(results in arb_results()) {
        let summary = RunSummary::from_results(results.values());

        prop_assert_eq!(
            summary.total_issues,
            summary.critical_count + summary.warning_count + summary.info_count
        );

        let all: Vec<&Issue> = results.values().flat_map(|r| r.issues()).collect();
        prop_assert_eq!(summary.total_issues, all.len() as u64);
        for (severity, count) in [
            (Severity::Critical, summary.critical_count),
            (Severity::Warning, summary.warning_count),
            (Severity::Info, summary.info_count),
        ] {
            prop_assert_eq!(all.iter().filter(|i| i.severity == severity).count() as u64, count);
        }
    }

    /// A run is critical exactly when it has a critical issue, warning when the
    /// worst issue is a warning, and healthy otherwise (info-only included).
    #[test]
    fn prop_overall_status_follows_worst_issue(results in arb_results()) {
        let summary = RunSummary::from_results(results.values());
        let worst = results.values().flat_map(|r| r.issues()).map(|i| i.severity).max();

        let expected = match worst {
            Some(Severity::Critical) => OverallStatus::Critical,
            Some(Severity::Warning) => OverallStatus::Warning,
            Some(Severity::Info) | None => OverallStatus::Healthy,
        };
        prop_assert_eq!(summary.overall_status, expected);
        prop_assert_eq!(
            summary.overall_status == OverallStatus::Critical,
            summary.critical_count > 0
        );
    }

    /// Checker status tracks its worst issue; a failed checker is critical and
    /// carries no issues.
    #[test]
    fn prop_checker_status_reflects_issues(result in arb_checker_result()) {
        match result.error() {
            Some(_) => {
                prop_assert_eq!(result.status(), CheckerStatus::Critical);
                prop_assert!(result.issues().is_empty());
            }
            None => {
                prop_assert_eq!(result.status(), CheckerStatus::from_issues(result.issues()));
                prop_assert_eq!(result.issues().is_empty(), result.status() == CheckerStatus::Healthy);
            }
        }
    }

    /// The persisted record carries the same counts it was built from and
    /// survives a JSON round trip unchanged.
    #[test]
    fn prop_health_run_matches_summary(results in arb_results(), ms in 0u64..60_000) {
        let expected = RunSummary::from_results(results.values());
        let run = HealthRun::new("admin", Utc::now(), results, ms);

        prop_assert_eq!(run.summary(), expected);
        prop_assert_eq!(run.issues_detail.len(), 4);

        let json = serde_json::to_string(&run).unwrap();
        let back: HealthRun = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, run);
    }

    /// Duplicate groups cover exactly the values seen more than once, and
    /// the affected count is the number of rows in those groups.
    #[test]
    fn prop_duplicate_groups_are_exact(values in proptest::collection::vec("[a-e]", 0..40)) {
        let groups = find_duplicates(values.clone());

        for group in &groups {
            prop_assert!(group.count >= 2);
            prop_assert_eq!(
                values.iter().filter(|v| **v == group.value).count() as u64,
                group.count
            );
        }
        let affected: u64 = groups.iter().map(|g| g.count).sum();
        let repeated = values
            .iter()
            .filter(|v| values.iter().filter(|w| w == v).count() > 1)
            .count() as u64;
        prop_assert_eq!(affected, repeated);

        let ordered: Vec<&String> = groups.iter().map(|g| &g.value).collect();
        let mut sorted = ordered.clone();
        sorted.sort();
        prop_assert_eq!(ordered, sorted);
    }

    /// Overlap detection agrees with the half-open interval definition.
    #[test]
    fn prop_overlaps_match_brute_force(slots in arb_slots()) {
        let found = find_overlaps(&slots);

        let mut expected = 0usize;
        for (i, a) in slots.iter().enumerate() {
            for b in &slots[i + 1..] {
                if a.start < b.end && b.start < a.end {
                    expected += 1;
                }
            }
        }
        prop_assert_eq!(found.len(), expected);

        for (a, b) in &found {
            prop_assert_ne!(a, b);
        }
    }

    /// A config with day windows in range validates, and every accepted
    /// window yields a computable start date.
    #[test]
    fn prop_day_windows_validate_iff_in_range(
        stale in any::<i64>(),
        recent in -10i64..=MAX_WINDOW_DAYS + 10,
        growth in prop_oneof![1i64..=MAX_WINDOW_DAYS, any::<i64>()],
    ) {
        let config = HealthConfig {
            stale_after_days: stale,
            recent_activity_days: recent,
            growth_window_days: growth,
            ..Default::default()
        };
        let in_range = |d: i64| (1..=MAX_WINDOW_DAYS).contains(&d);
        let expected = in_range(stale) && in_range(recent) && in_range(growth);
        prop_assert_eq!(config.validate().is_ok(), expected);

        if expected {
            let ctx = RunContext::new(config, "prop");
            prop_assert!(ctx.days_ago(growth * 2).is_ok());
            prop_assert!(ctx.days_ago(stale).is_ok());
        }
    }

    /// Row caps validate exactly when they lie in `1..=MAX_ROW_CAP`.
    #[test]
    fn prop_row_caps_validate_iff_in_range(
        orphan in 0usize..=MAX_ROW_CAP + 10,
        schedule in prop_oneof![Just(0usize), Just(usize::MAX), 1usize..=MAX_ROW_CAP],
    ) {
        let config = HealthConfig {
            orphan_sample_limit: orphan,
            schedule_scan_limit: schedule,
            ..Default::default()
        };
        let in_range = |c: usize| (1..=MAX_ROW_CAP).contains(&c);
        prop_assert_eq!(config.validate().is_ok(), in_range(orphan) && in_range(schedule));
    }
}
