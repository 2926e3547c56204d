//! # Auth Test Utilities
//!
//! Shared test utilities for the auth service.
//!
//! This crate provides:
//! - Server test harness (`TestAuthServer` for E2E tests over in-memory stores)
//! - Fixed fixtures (signing key, passwords, gateway URL)
//! - Gateway identity header helpers for the admin routes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestAuthServer::spawn().await?;
//!     let user = server.seed_verified_user("a@b.c", "alice", TEST_PASSWORD).await?;
//!
//!     let response = reqwest::Client::new()
//!         .post(server.endpoint("/api/v1/auth/login"))
//!         .json(&login_body("a@b.c", TEST_PASSWORD))
//!         .send()
//!         .await?;
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;

pub use fixtures::*;
pub use server_harness::*;
