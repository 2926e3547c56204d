//! Consumed payloads. Only the fields a projection needs are decoded;
//! everything else in the body is ignored.

use common::events::string_or_number;
use serde::Deserialize;
use uuid::Uuid;

/// `user.user.updated`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserUpdated {
    pub id: Uuid,
    pub username: String,
}

/// `zoom.meeting.created`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MeetingCreated {
    pub section_module_id: Uuid,
    #[serde(deserialize_with = "string_or_number")]
    pub zoom_meeting_id: String,
}
