//! Observability for the zoom service.
//!
//! Provider start URLs carry a host key and are never logged.

pub mod metrics;

pub use metrics::{record_meeting_operation, record_provider_call};
