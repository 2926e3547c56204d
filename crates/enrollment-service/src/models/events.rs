//! Consumed payloads, trimmed to the projected fields.

use serde::Deserialize;
use uuid::Uuid;

/// `user.user.updated`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserUpdated {
    pub id: Uuid,
    pub username: String,
}

/// `course.course.updated`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CourseUpdated {
    pub id: Uuid,
    pub name: String,
}

/// `course.offering.updated`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct OfferingUpdated {
    pub id: Uuid,
    pub name: String,
}
