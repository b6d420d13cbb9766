//! Business rules checker.

use async_trait::async_trait;
use std::sync::Arc;

use super::{boxed, run_checker};
use crate::constants::*;
use crate::datastore::{DataStore, Predicate};
use crate::health::model::{CheckerKind, CheckerResult, Severity};
use crate::health::probes::{
    CapacityProbe, DepartedStudentEnrollmentProbe, ScheduleConflictProbe, SingletonProbe,
    StateRuleProbe,
};
use crate::health::traits::{Checker, Probe, RunContext};

pub struct BusinessRulesChecker {
    store: Arc<dyn DataStore>,
    probes: Vec<Box<dyn Probe>>,
}

impl BusinessRulesChecker {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            probes: Self::probes(),
        }
    }

    fn probes() -> Vec<Box<dyn Probe>> {
        use Severity::{Critical, Info, Warning};

        vec![
            boxed(SingletonProbe::new(
                TABLE_ACADEMIC_PERIODS,
                "is_active",
                "name",
                "academic period",
            )),
            boxed(ScheduleConflictProbe::new()),
            boxed(CapacityProbe::new(Warning)),
            boxed(StateRuleProbe::new(
                "withdrawn_without_date",
                TABLE_ENROLLMENTS,
                vec![
                    Predicate::eq("status", "withdrawn"),
                    Predicate::is_null("withdrawn_at"),
                ],
                "withdrawn without a withdrawal date",
                Warning,
            )),
            boxed(StateRuleProbe::new(
                "enrolled_with_withdrawal_date",
                TABLE_ENROLLMENTS,
                vec![
                    Predicate::eq("status", "enrolled"),
                    Predicate::is_not_null("withdrawn_at"),
                ],
                "still enrolled but carrying a withdrawal date",
                Warning,
            )),
            boxed(StateRuleProbe::new(
                "published_without_score",
                TABLE_GRADES,
                vec![
                    Predicate::eq("status", "published"),
                    Predicate::is_null("score"),
                ],
                "published without a score",
                Critical,
            )),
            boxed(StateRuleProbe::new(
                "active_student_without_class",
                TABLE_STUDENTS,
                vec![
                    Predicate::eq("status", "active"),
                    Predicate::is_null("class_id"),
                ],
                "active without a class assignment",
                Info,
            )),
            boxed(DepartedStudentEnrollmentProbe::new(Warning)),
        ]
    }
}

#[async_trait]
impl Checker for BusinessRulesChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::BusinessRules
    }

    async fn run(&self, ctx: &RunContext) -> CheckerResult {
        run_checker(
            self.kind(),
            self.store.as_ref(),
            &[TABLE_ACADEMIC_PERIODS],
            &self.probes,
            ctx,
        )
        .await
    }
}
