//! Meeting orchestration.
//!
//! Create reserves the module, provisions the provider meeting, stores the
//! local row, and announces `zoom.meeting.created` so course-service can
//! link the module. Update and delete hit the provider first and only then
//! touch the local row.

use crate::errors::ZoomError;
use crate::models::events::MeetingCreatedEvent;
use crate::models::{
    CreateMeetingRequest, Meeting, MeetingChanges, NewMeeting, UpdateMeetingRequest,
    MAX_AGENDA_LENGTH, MAX_DURATION_MINUTES, MAX_TOPIC_LENGTH,
};
use crate::repositories::MeetingRepository;
use crate::services::provider::{
    MeetingProvider, ProviderMeetingRequest, MEETING_TYPE_INSTANT, MEETING_TYPE_SCHEDULED,
};
use common::events::{routing, EventPublisher};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub struct MeetingService {
    meetings: Arc<dyn MeetingRepository>,
    provider: Arc<dyn MeetingProvider>,
    publisher: Arc<dyn EventPublisher>,
}

impl MeetingService {
    pub fn new(
        meetings: Arc<dyn MeetingRepository>,
        provider: Arc<dyn MeetingProvider>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            meetings,
            provider,
            publisher,
        }
    }

    #[instrument(skip_all, name = "zoom.meeting.create", fields(section_module_id = %request.section_module_id))]
    pub async fn create(
        &self,
        request: CreateMeetingRequest,
        created_by: Option<Uuid>,
    ) -> Result<Meeting, ZoomError> {
        let topic = validate_topic(&request.topic)?;
        validate_details(
            request.agenda.as_deref(),
            request.duration,
            request.timezone.as_deref(),
        )?;

        if self
            .meetings
            .find_by_module(request.section_module_id)
            .await?
            .is_some()
        {
            return Err(ZoomError::Conflict(
                "a meeting already exists for this module".to_string(),
            ));
        }

        let provider_request = ProviderMeetingRequest {
            topic: Some(topic.clone()),
            meeting_type: Some(if request.start_time.is_some() {
                MEETING_TYPE_SCHEDULED
            } else {
                MEETING_TYPE_INSTANT
            }),
            agenda: request.agenda.clone(),
            start_time: request.start_time,
            duration: request.duration,
            timezone: request.timezone.clone(),
            settings: request.settings.clone(),
        };
        let provisioned = self.provider.create_meeting(&provider_request).await?;

        let new = NewMeeting {
            section_module_id: request.section_module_id,
            zoom_meeting_id: provisioned.id.clone(),
            topic,
            agenda: request.agenda,
            start_time: provisioned.start_time.or(request.start_time),
            duration_minutes: provisioned.duration.or(request.duration),
            timezone: provisioned.timezone.clone().or(request.timezone),
            join_url: provisioned.join_url.clone(),
            start_url: provisioned.start_url.clone(),
            passcode: provisioned.password.clone(),
            created_by,
        };

        let meeting = match self.meetings.insert(new).await {
            Ok(meeting) => meeting,
            Err(e) => {
                // Lost a race for the module or the store failed; do not
                // leave an orphan at the provider.
                warn!(target: "zoom.meeting", zoom_meeting_id = %provisioned.id, error = %e, "Local insert failed, removing provider meeting");
                if let Err(cleanup) = self.provider.delete_meeting(&provisioned.id).await {
                    error!(target: "zoom.meeting", zoom_meeting_id = %provisioned.id, error = %cleanup, "Orphaned provider meeting");
                }
                return Err(e);
            }
        };

        info!(
            target: "zoom.meeting",
            meeting_id = %meeting.id,
            zoom_meeting_id = %meeting.zoom_meeting_id,
            "Meeting created"
        );

        let event = MeetingCreatedEvent::from(&meeting);
        if let Err(e) = self
            .publisher
            .publish(routing::ZOOM_MEETING_CREATED, &event)
            .await
        {
            warn!(target: "zoom.meeting", meeting_id = %meeting.id, error = %e, "Failed to publish meeting created event");
        }

        Ok(meeting)
    }

    #[instrument(skip_all, name = "zoom.meeting.get", fields(meeting_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Meeting, ZoomError> {
        self.meetings
            .find_by_id(id)
            .await?
            .ok_or_else(|| ZoomError::NotFound("meeting not found".to_string()))
    }

    #[instrument(skip_all, name = "zoom.meeting.get_by_module", fields(section_module_id = %section_module_id))]
    pub async fn get_by_module(&self, section_module_id: Uuid) -> Result<Meeting, ZoomError> {
        self.meetings
            .find_by_module(section_module_id)
            .await?
            .ok_or_else(|| ZoomError::NotFound("no meeting for this module".to_string()))
    }

    #[instrument(skip_all, name = "zoom.meeting.update", fields(meeting_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateMeetingRequest,
    ) -> Result<Meeting, ZoomError> {
        if request.is_empty() {
            return Err(ZoomError::Validation("no fields to update".to_string()));
        }
        let topic = request.topic.as_deref().map(validate_topic).transpose()?;
        validate_details(
            request.agenda.as_deref(),
            request.duration,
            request.timezone.as_deref(),
        )?;

        let meeting = self.get(id).await?;

        let provider_request = ProviderMeetingRequest {
            topic: topic.clone(),
            meeting_type: None,
            agenda: request.agenda.clone(),
            start_time: request.start_time,
            duration: request.duration,
            timezone: request.timezone.clone(),
            settings: request.settings,
        };
        self.provider
            .update_meeting(&meeting.zoom_meeting_id, &provider_request)
            .await?;

        let changes = MeetingChanges {
            topic,
            agenda: request.agenda,
            start_time: request.start_time,
            duration_minutes: request.duration,
            timezone: request.timezone,
        };
        let updated = self
            .meetings
            .update(id, changes)
            .await?
            .ok_or_else(|| ZoomError::NotFound("meeting not found".to_string()))?;

        info!(target: "zoom.meeting", meeting_id = %id, "Meeting updated");
        Ok(updated)
    }

    #[instrument(skip_all, name = "zoom.meeting.delete", fields(meeting_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ZoomError> {
        let meeting = self.get(id).await?;

        self.provider
            .delete_meeting(&meeting.zoom_meeting_id)
            .await?;
        self.meetings.delete(id).await?;

        info!(target: "zoom.meeting", meeting_id = %id, zoom_meeting_id = %meeting.zoom_meeting_id, "Meeting deleted");
        Ok(())
    }
}

fn validate_topic(topic: &str) -> Result<String, ZoomError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(ZoomError::Validation("topic is required".to_string()));
    }
    if topic.chars().count() > MAX_TOPIC_LENGTH {
        return Err(ZoomError::Validation(format!(
            "topic must be at most {MAX_TOPIC_LENGTH} characters"
        )));
    }
    Ok(topic.to_string())
}

fn validate_details(
    agenda: Option<&str>,
    duration: Option<i32>,
    timezone: Option<&str>,
) -> Result<(), ZoomError> {
    if agenda.is_some_and(|a| a.chars().count() > MAX_AGENDA_LENGTH) {
        return Err(ZoomError::Validation(format!(
            "agenda must be at most {MAX_AGENDA_LENGTH} characters"
        )));
    }
    if let Some(duration) = duration {
        if !(1..=MAX_DURATION_MINUTES).contains(&duration) {
            return Err(ZoomError::Validation(format!(
                "duration must be between 1 and {MAX_DURATION_MINUTES} minutes"
            )));
        }
    }
    if timezone.is_some_and(|tz| tz.trim().is_empty()) {
        return Err(ZoomError::Validation("timezone must not be empty".to_string()));
    }
    Ok(())
}
