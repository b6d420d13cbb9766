//! Operational health checker: is the system being used and maintained.

use async_trait::async_trait;
use std::sync::Arc;

use super::{boxed, run_checker};
use crate::constants::*;
use crate::datastore::DataStore;
use crate::health::model::{CheckerKind, CheckerResult, Severity};
use crate::health::probes::{
    FreshnessProbe, InactivityRatioProbe, RecentActivityProbe, RunRetentionProbe,
    SettingsCompletenessProbe, VolumeGrowthProbe,
};
use crate::health::traits::{Checker, Probe, RunContext};

/// Grades are entered less often than attendance.
const GRADE_ACTIVITY_WINDOW_DAYS: i64 = 30;

pub struct OperationalHealthChecker {
    store: Arc<dyn DataStore>,
    probes: Vec<Box<dyn Probe>>,
}

impl OperationalHealthChecker {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            probes: Self::probes(),
        }
    }

    fn probes() -> Vec<Box<dyn Probe>> {
        vec![
            boxed(FreshnessProbe::new(TABLE_ATTENDANCE, "created_at")),
            boxed(FreshnessProbe::new(TABLE_GRADES, "created_at")),
            boxed(RecentActivityProbe::new(TABLE_ATTENDANCE, "date", Severity::Warning)),
            boxed(
                RecentActivityProbe::new(TABLE_GRADES, "created_at", Severity::Info)
                    .with_window(GRADE_ACTIVITY_WINDOW_DAYS),
            ),
            boxed(InactivityRatioProbe::new(TABLE_STUDENTS, "status", "active")),
            boxed(InactivityRatioProbe::new(TABLE_TEACHERS, "status", "active")),
            boxed(VolumeGrowthProbe::new(TABLE_ATTENDANCE, "created_at")),
            boxed(VolumeGrowthProbe::new(TABLE_GRADES, "created_at")),
            boxed(VolumeGrowthProbe::new(TABLE_ENROLLMENTS, "created_at")),
            boxed(SettingsCompletenessProbe::new(REQUIRED_SETTINGS)),
            boxed(RunRetentionProbe::new()),
        ]
    }
}

#[async_trait]
impl Checker for OperationalHealthChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::OperationalHealth
    }

    async fn run(&self, ctx: &RunContext) -> CheckerResult {
        run_checker(
            self.kind(),
            self.store.as_ref(),
            &[TABLE_ATTENDANCE],
            &self.probes,
            ctx,
        )
        .await
    }
}
