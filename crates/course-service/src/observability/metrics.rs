//! Course projection metrics.
//!
//! # Cardinality
//!
//! - `projection`: instructor_username, module_meeting

use metrics::counter;

/// Record an applied projection update.
///
/// Metric: `lms_course_projection_updates_total`, `lms_course_projection_rows_total`
/// Labels: `projection`
pub fn record_projection_update(projection: &'static str, rows: u64) {
    counter!("lms_course_projection_updates_total", "projection" => projection).increment(1);
    counter!("lms_course_projection_rows_total", "projection" => projection).increment(rows);
}
