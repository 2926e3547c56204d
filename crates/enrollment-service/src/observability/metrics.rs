//! Enrollment projection metrics.
//!
//! # Cardinality
//!
//! - `column`: student_username, course_name, course_offering_name

use metrics::counter;

/// Metric: `lms_enrollment_projection_updates_total`, `lms_enrollment_projection_rows_total`
pub fn record_projection_update(column: &'static str, rows: u64) {
    counter!("lms_enrollment_projection_updates_total", "column" => column).increment(1);
    counter!("lms_enrollment_projection_rows_total", "column" => column).increment(rows);
}
