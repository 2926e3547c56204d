//! Zoom service library.
//!
//! Provisions provider video meetings for course section modules and
//! announces them on the event bus.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
