//! File service metrics.
//!
//! # Cardinality
//!
//! - `bucket`: the four known buckets
//! - `operation`: upload, download, presign, delete
//! - `error_code`: bounded by `FileError::code`

use metrics::{counter, histogram};

/// Record a stored upload.
///
/// Metric: `lms_file_uploads_total`, `lms_file_upload_bytes`
/// Labels: `bucket`
pub fn record_upload(bucket: &'static str, size_bytes: u64) {
    counter!("lms_file_uploads_total", "bucket" => bucket).increment(1);
    #[allow(clippy::cast_precision_loss)]
    histogram!("lms_file_upload_bytes", "bucket" => bucket).record(size_bytes as f64);
}

/// Record a started download.
///
/// Metric: `lms_file_downloads_total`
/// Labels: `bucket`
pub fn record_download(bucket: &'static str) {
    counter!("lms_file_downloads_total", "bucket" => bucket).increment(1);
}

/// Record the outcome of a file API operation.
///
/// Metric: `lms_file_operations_total`
/// Labels: `operation`, `status`, `error_code`
pub fn record_file_operation(operation: &'static str, error_code: Option<&'static str>) {
    let status = if error_code.is_some() { "error" } else { "success" };
    counter!(
        "lms_file_operations_total",
        "operation" => operation,
        "status" => status,
        "error_code" => error_code.unwrap_or("none")
    )
    .increment(1);
}
