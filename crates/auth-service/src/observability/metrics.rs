//! Auth service metrics.
//!
//! - `lms_auth_` prefix
//! - `_total` suffix for counters, `_seconds` for duration histograms
//!
//! # Cardinality
//!
//! - `operation`: bounded by code (register, login, logout, refresh, ...)
//! - `status`: 2 values (success, error)
//! - `error_code`: bounded by `AuthError::code`
//! - `outcome`: bounded by `TokenError` kinds plus `ok` / `revoked` / `forbidden`

use metrics::{counter, histogram};
use std::time::Duration;

/// Record the outcome and duration of an auth operation.
///
/// Metric: `lms_auth_operations_total`, `lms_auth_operation_duration_seconds`
/// Labels: `operation`, `status`, `error_code`
pub fn record_auth_operation(
    operation: &'static str,
    error_code: Option<&'static str>,
    duration: Duration,
) {
    let status = if error_code.is_some() { "error" } else { "success" };
    let error_code = error_code.unwrap_or("none");

    histogram!("lms_auth_operation_duration_seconds", "operation" => operation, "status" => status)
        .record(duration.as_secs_f64());

    counter!("lms_auth_operations_total", "operation" => operation, "status" => status, "error_code" => error_code)
        .increment(1);
}

/// Record a gateway verify decision.
///
/// Metric: `lms_auth_token_verifications_total`
/// Labels: `outcome`
pub fn record_token_verification(outcome: &'static str) {
    counter!("lms_auth_token_verifications_total", "outcome" => outcome).increment(1);
}
