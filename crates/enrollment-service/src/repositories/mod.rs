pub mod enrollments;

pub use enrollments::{EnrollmentProjectionStore, PgEnrollmentProjectionStore};
