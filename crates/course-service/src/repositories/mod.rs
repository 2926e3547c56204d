pub mod projections;

pub use projections::{CourseProjectionStore, PgCourseProjectionStore};
