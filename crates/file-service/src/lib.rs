//! File service library.
//!
//! Object store plus metadata index: uploads are routed to a bucket,
//! downloads are gated by bucket, and deletes are soft.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
