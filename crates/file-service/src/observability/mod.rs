//! Observability for the file service.

pub mod metrics;

pub use metrics::{record_download, record_file_operation, record_upload};
