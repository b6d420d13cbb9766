//! Integrity checker.
//!
//! Groups the structural, referential, constraint and duplicate probes over
//! the core school tables.

use async_trait::async_trait;
use std::sync::Arc;

use super::{boxed, run_checker};
use crate::constants::*;
use crate::datastore::DataStore;
use crate::health::model::{CheckerKind, CheckerResult, Severity};
use crate::health::probes::{
    DuplicateProbe, EmptyTableProbe, OrphanProbe, RangeProbe, RequiredFieldProbe,
    TableAccessProbe,
};
use crate::health::traits::{Checker, Probe, RunContext};

/// Tables that should never be empty in a configured school.
const POPULATED_TABLES: &[&str] = &[TABLE_STUDENTS, TABLE_TEACHERS, TABLE_SUBJECTS, TABLE_CLASSES];

pub struct IntegrityChecker {
    store: Arc<dyn DataStore>,
    probes: Vec<Box<dyn Probe>>,
}

impl IntegrityChecker {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            probes: Self::probes(),
        }
    }

    fn probes() -> Vec<Box<dyn Probe>> {
        use Severity::{Critical, Info, Warning};

        let mut probes: Vec<Box<dyn Probe>> = CORE_TABLES
            .iter()
            .map(|t| boxed(TableAccessProbe::new(t)))
            .collect();
        probes.extend(
            POPULATED_TABLES
                .iter()
                .map(|t| boxed(EmptyTableProbe::new(t, Warning))),
        );

        // references
        let references = [
            (TABLE_ENROLLMENTS, "student_id", TABLE_STUDENTS, Critical),
            (TABLE_ENROLLMENTS, "class_id", TABLE_CLASSES, Critical),
            (TABLE_ATTENDANCE, "student_id", TABLE_STUDENTS, Critical),
            (TABLE_GRADES, "student_id", TABLE_STUDENTS, Critical),
            (TABLE_GRADES, "subject_id", TABLE_SUBJECTS, Warning),
            (TABLE_SCHEDULES, "class_id", TABLE_CLASSES, Warning),
            (TABLE_SCHEDULES, "teacher_id", TABLE_TEACHERS, Warning),
            (TABLE_SCHEDULES, "subject_id", TABLE_SUBJECTS, Warning),
            (TABLE_STUDENTS, "class_id", TABLE_CLASSES, Warning),
            (TABLE_CLASSES, "academic_period_id", TABLE_ACADEMIC_PERIODS, Warning),
        ];
        probes.extend(
            references
                .into_iter()
                .map(|(table, column, parent, severity)| {
                    boxed(OrphanProbe::new(table, column, parent, severity))
                }),
        );

        // constraints
        probes.push(boxed(RangeProbe::new(TABLE_GRADES, "score", 0.0, 100.0, Warning)));
        probes.push(boxed(RangeProbe::new(TABLE_CLASSES, "capacity", 1.0, 60.0, Warning)));
        probes.push(boxed(RangeProbe::new(TABLE_SUBJECTS, "credits", 0.0, 10.0, Info)));
        probes.push(boxed(RangeProbe::new(TABLE_SCHEDULES, "day_of_week", 1.0, 7.0, Critical)));
        probes.push(boxed(RangeProbe::new(TABLE_CLASSES, "grade_level", 1.0, 12.0, Warning)));
        probes.push(boxed(RequiredFieldProbe::new(TABLE_STUDENTS, "student_number", Critical)));
        probes.push(boxed(RequiredFieldProbe::new(TABLE_STUDENTS, "last_name", Warning)));
        probes.push(boxed(RequiredFieldProbe::new(TABLE_TEACHERS, "email", Warning)));

        // duplicates
        probes.push(boxed(DuplicateProbe::new(TABLE_STUDENTS, &["student_number"], Critical)));
        probes.push(boxed(DuplicateProbe::new(TABLE_SUBJECTS, &["code"], Critical)));
        probes.push(boxed(DuplicateProbe::new(TABLE_STUDENTS, &["email"], Warning)));
        probes.push(boxed(DuplicateProbe::new(TABLE_TEACHERS, &["email"], Warning)));
        probes.push(boxed(DuplicateProbe::new(
            TABLE_ATTENDANCE,
            &["student_id", "class_id", "date"],
            Warning,
        )));
        probes.push(boxed(DuplicateProbe::new(
            TABLE_ENROLLMENTS,
            &["student_id", "class_id", "academic_period_id"],
            Warning,
        )));

        probes
    }
}

#[async_trait]
impl Checker for IntegrityChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Integrity
    }

    async fn run(&self, ctx: &RunContext) -> CheckerResult {
        run_checker(
            self.kind(),
            self.store.as_ref(),
            &[TABLE_STUDENTS],
            &self.probes,
            ctx,
        )
        .await
    }
}
