/// Academic periods (terms / semesters)
pub const TABLE_ACADEMIC_PERIODS: &str = "academic_periods";

/// Teaching staff
pub const TABLE_TEACHERS: &str = "teachers";

/// Subjects offered
pub const TABLE_SUBJECTS: &str = "subjects";

/// Class sections
pub const TABLE_CLASSES: &str = "classes";

/// Students
pub const TABLE_STUDENTS: &str = "students";

/// Student enrollments into classes
pub const TABLE_ENROLLMENTS: &str = "enrollments";

/// Weekly timetable slots
pub const TABLE_SCHEDULES: &str = "schedules";

/// Daily attendance records
pub const TABLE_ATTENDANCE: &str = "attendance";

/// Grade entries
pub const TABLE_GRADES: &str = "grades";

/// Key/value school configuration
pub const TABLE_SCHOOL_SETTINGS: &str = "school_settings";

/// Persisted health run audit records
pub const TABLE_HEALTH_RUNS: &str = "health_runs";

/// Tables every installation is expected to have
pub const CORE_TABLES: &[&str] = &[
    TABLE_ACADEMIC_PERIODS,
    TABLE_TEACHERS,
    TABLE_SUBJECTS,
    TABLE_CLASSES,
    TABLE_STUDENTS,
    TABLE_ENROLLMENTS,
    TABLE_SCHEDULES,
    TABLE_ATTENDANCE,
    TABLE_GRADES,
    TABLE_SCHOOL_SETTINGS,
];

/// Settings keys a configured school must define
pub const REQUIRED_SETTINGS: &[&str] = &["school_name", "timezone", "grading_scale", "attendance_policy"];
