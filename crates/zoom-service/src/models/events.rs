//! Payloads published on the event bus.

use super::Meeting;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `zoom.meeting.created`
///
/// Course-service links the module to the meeting on receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeetingCreatedEvent {
    pub section_module_id: Uuid,
    pub zoom_meeting_id: String,
    pub topic: String,
    pub join_url: String,
    pub start_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Meeting> for MeetingCreatedEvent {
    fn from(meeting: &Meeting) -> Self {
        Self {
            section_module_id: meeting.section_module_id,
            zoom_meeting_id: meeting.zoom_meeting_id.clone(),
            topic: meeting.topic.clone(),
            join_url: meeting.join_url.clone(),
            start_url: meeting.start_url.clone(),
            created_at: meeting.created_at,
        }
    }
}
