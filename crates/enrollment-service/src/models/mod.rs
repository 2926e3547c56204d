pub mod events;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Enrollment row with its projected display names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub student_username: String,
    pub course_id: Uuid,
    pub course_name: String,
    pub course_offering_id: Uuid,
    pub course_offering_name: String,
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
