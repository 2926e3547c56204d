//! Observability for the auth service.
//!
//! Tokens, OTPs, passwords, and hashes never appear in spans or logs; service
//! functions use `#[instrument(skip_all)]` and record only ids and outcomes.

pub mod metrics;

pub use metrics::{record_auth_operation, record_token_verification};
