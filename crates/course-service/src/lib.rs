//! Course service library.
//!
//! Keeps denormalized course data (instructor usernames, module meeting
//! links) in step with events from the user and zoom services.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
