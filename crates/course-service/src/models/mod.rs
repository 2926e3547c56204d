//! Projection rows and the event payloads that feed them.

pub mod events;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// `section_modules.content_status` once a meeting is linked.
pub const CONTENT_STATUS_CREATED: &str = "created";

/// `section_modules.content_status` before anything is linked.
pub const CONTENT_STATUS_PENDING: &str = "pending";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferingInstructor {
    pub id: Uuid,
    pub course_offering_id: Uuid,
    pub instructor_id: Uuid,
    pub instructor_username: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionModule {
    pub id: Uuid,
    pub section_id: Uuid,
    pub title: String,
    pub content_id: Option<String>,
    pub content_status: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
