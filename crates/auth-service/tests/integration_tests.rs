//! Integration tests for the auth service
//!
//! This is the top-level integration test harness that Cargo discovers.
//! Test modules are organized in the integration/ subdirectory.

#[path = "integration/registration_tests.rs"]
mod registration_tests;

#[path = "integration/session_tests.rs"]
mod session_tests;

#[path = "integration/password_reset_tests.rs"]
mod password_reset_tests;

#[path = "integration/admin_users_tests.rs"]
mod admin_users_tests;
