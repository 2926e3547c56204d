//! Zoom service metrics.
//!
//! # Cardinality
//!
//! - `operation`: create, get, update, delete, token
//! - `outcome`: success, client_error, server_error, unavailable
//! - `error_code`: bounded by `ZoomError::code`

use metrics::{counter, histogram};
use std::time::Duration;

/// Record one call to the meeting provider.
///
/// Metric: `lms_zoom_provider_calls_total`, `lms_zoom_provider_call_duration_seconds`
/// Labels: `operation`, `outcome`
pub fn record_provider_call(operation: &'static str, outcome: &'static str, duration: Duration) {
    histogram!("lms_zoom_provider_call_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
    counter!("lms_zoom_provider_calls_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
}

/// Record the outcome of a meeting API operation.
///
/// Metric: `lms_zoom_meeting_operations_total`
/// Labels: `operation`, `status`, `error_code`
pub fn record_meeting_operation(operation: &'static str, error_code: Option<&'static str>) {
    let status = if error_code.is_some() { "error" } else { "success" };
    counter!(
        "lms_zoom_meeting_operations_total",
        "operation" => operation,
        "status" => status,
        "error_code" => error_code.unwrap_or("none")
    )
    .increment(1);
}
