//! Auth service library.
//!
//! Credential verification, access/refresh tokens with server-side
//! revocation, OTP password reset, email verification, and admin user
//! management. Exposed as a library so integration tests and the test
//! harness can build the router against in-memory stores.

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
