//! Enrollment service library.
//!
//! Keeps the student, course and offering names stored on each enrollment
//! eventually equal to their owning services.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
