//! Data validation checker: field-level rules that span rows or tables.

use async_trait::async_trait;
use std::sync::Arc;

use super::{boxed, run_checker};
use crate::constants::*;
use crate::datastore::DataStore;
use crate::health::model::{CheckerKind, CheckerResult, Severity};
use crate::health::probes::{
    DateSanityProbe, DenormalizedCopyProbe, EmailFormatProbe, EnumerationProbe, FieldOrderProbe,
};
use crate::health::traits::{Checker, Probe, RunContext};

pub const STUDENT_STATUSES: &[&str] = &["active", "inactive", "graduated", "transferred"];
pub const TEACHER_STATUSES: &[&str] = &["active", "inactive", "on_leave"];
pub const ATTENDANCE_STATUSES: &[&str] = &["present", "absent", "late", "excused"];
pub const ENROLLMENT_STATUSES: &[&str] = &["enrolled", "withdrawn", "completed"];
pub const GRADE_TYPES: &[&str] = &["exam", "quiz", "assignment", "project", "final"];
pub const GRADE_STATUSES: &[&str] = &["draft", "published", "archived"];

pub struct DataValidationChecker {
    store: Arc<dyn DataStore>,
    probes: Vec<Box<dyn Probe>>,
}

impl DataValidationChecker {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            probes: Self::probes(),
        }
    }

    fn probes() -> Vec<Box<dyn Probe>> {
        use Severity::{Critical, Info, Warning};

        vec![
            // enumerations
            boxed(EnumerationProbe::new(TABLE_STUDENTS, "status", STUDENT_STATUSES, Warning)),
            boxed(EnumerationProbe::new(TABLE_TEACHERS, "status", TEACHER_STATUSES, Warning)),
            boxed(EnumerationProbe::new(TABLE_ATTENDANCE, "status", ATTENDANCE_STATUSES, Warning)),
            boxed(EnumerationProbe::new(TABLE_ENROLLMENTS, "status", ENROLLMENT_STATUSES, Warning)),
            boxed(EnumerationProbe::new(TABLE_GRADES, "grade_type", GRADE_TYPES, Info).nullable()),
            boxed(EnumerationProbe::new(TABLE_GRADES, "status", GRADE_STATUSES, Warning)),
            // dates
            boxed(DateSanityProbe::birth_date(TABLE_STUDENTS, "date_of_birth", Warning)),
            boxed(DateSanityProbe::not_in_future(TABLE_ATTENDANCE, "date", Warning)),
            boxed(DateSanityProbe::not_in_future(TABLE_GRADES, "graded_at", Info)),
            // field order
            boxed(FieldOrderProbe::new(TABLE_ACADEMIC_PERIODS, "start_date", "end_date", Critical)),
            boxed(FieldOrderProbe::new(TABLE_ENROLLMENTS, "enrolled_at", "withdrawn_at", Warning)),
            boxed(FieldOrderProbe::new(TABLE_SCHEDULES, "start_time", "end_time", Warning).strict()),
            boxed(FieldOrderProbe::new(TABLE_GRADES, "score", "max_score", Warning)),
            // formats
            boxed(EmailFormatProbe::new(TABLE_STUDENTS, "email", Info)),
            boxed(EmailFormatProbe::new(TABLE_TEACHERS, "email", Info)),
            // denormalized copies
            boxed(DenormalizedCopyProbe::new(
                TABLE_GRADES,
                "student_id",
                "student_name",
                TABLE_STUDENTS,
                &["first_name", "last_name"],
                Warning,
            )),
            boxed(DenormalizedCopyProbe::new(
                TABLE_ENROLLMENTS,
                "class_id",
                "academic_period_id",
                TABLE_CLASSES,
                &["academic_period_id"],
                Warning,
            )),
        ]
    }
}

#[async_trait]
impl Checker for DataValidationChecker {
    fn kind(&self) -> CheckerKind {
        CheckerKind::DataValidation
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
