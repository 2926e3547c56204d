//! Meeting records and request/response shapes.

pub mod events;

pub use common::events::string_or_number;

use chrono::{DateTime, Utc};
use common::identity::GatewayIdentity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_TOPIC_LENGTH: usize = 200;
pub const MAX_AGENDA_LENGTH: usize = 2000;
/// Longest scheduled meeting the provider accepts, in minutes.
pub const MAX_DURATION_MINUTES: i32 = 1440;

/// A provider meeting bound to one section module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Meeting {
    pub id: Uuid,
    pub section_module_id: Uuid,
    pub zoom_meeting_id: String,
    pub topic: String,
    pub agenda: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub timezone: Option<String>,
    pub join_url: String,
    pub start_url: String,
    pub passcode: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub section_module_id: Uuid,
    pub zoom_meeting_id: String,
    pub topic: String,
    pub agenda: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub timezone: Option<String>,
    pub join_url: String,
    pub start_url: String,
    pub passcode: Option<String>,
    pub created_by: Option<Uuid>,
}

/// Partial update of the locally stored copy.
#[derive(Debug, Clone, Default)]
pub struct MeetingChanges {
    pub topic: Option<String>,
    pub agenda: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub timezone: Option<String>,
}

/// Provider-side meeting options. Unset fields keep the provider default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MeetingSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_video: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_video: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_before_host: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute_upon_entry: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting_room: Option<bool>,
    /// `local`, `cloud`, or `none`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_recording: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateMeetingRequest {
    pub section_module_id: Uuid,
    pub topic: String,
    #[serde(default)]
    pub agenda: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: Option<i32>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub settings: Option<MeetingSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMeetingRequest {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub agenda: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: Option<i32>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub settings: Option<MeetingSettings>,
}

impl UpdateMeetingRequest {
    pub fn is_empty(&self) -> bool {
        self.topic.is_none()
            && self.agenda.is_none()
            && self.start_time.is_none()
            && self.duration.is_none()
            && self.timezone.is_none()
            && self.settings.is_none()
    }
}

/// A meeting as returned to readers.
///
/// `start_url` logs the holder in as host; it is only shown to the creator,
/// instructors and admins. Anonymous callers do not see the passcode.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MeetingView {
    pub id: Uuid,
    pub section_module_id: Uuid,
    pub zoom_meeting_id: String,
    pub topic: String,
    pub agenda: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub timezone: Option<String>,
    pub join_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passcode: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MeetingView {
    pub fn for_caller(meeting: Meeting, caller: Option<&GatewayIdentity>) -> Self {
        let is_host = caller.is_some_and(|identity| {
            identity.is_admin()
                || identity.is_instructor()
                || meeting
                    .created_by
                    .is_some_and(|creator| creator.to_string() == identity.user_id)
        });

        Self {
            id: meeting.id,
            section_module_id: meeting.section_module_id,
            zoom_meeting_id: meeting.zoom_meeting_id,
            topic: meeting.topic,
            agenda: meeting.agenda,
            start_time: meeting.start_time,
            duration_minutes: meeting.duration_minutes,
            timezone: meeting.timezone,
            join_url: meeting.join_url,
            start_url: is_host.then_some(meeting.start_url),
            passcode: meeting.passcode.filter(|_| caller.is_some()),
            created_by: meeting.created_by,
            created_at: meeting.created_at,
            updated_at: meeting.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
