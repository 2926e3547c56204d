//! Routes consumed events onto the course projections.

use crate::models::events::{MeetingCreated, UserUpdated};
use crate::observability::record_projection_update;
use crate::repositories::CourseProjectionStore;
use async_trait::async_trait;
use common::events::{routing, EventHandler, HandleOutcome, RetryableError};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Durable queue owned by this service.
pub const QUEUE: &str = "course.queue";

/// Keys bound on [`QUEUE`].
pub const ROUTING_KEYS: &[&str] = &[routing::USER_UPDATED, routing::ZOOM_MEETING_CREATED];

/// A decoded event this service acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseEvent {
    UserUpdated(UserUpdated),
    MeetingCreated(MeetingCreated),
}

impl CourseEvent {
    /// `Ok(None)` for keys this service does not handle.
    pub fn decode(routing_key: &str, body: &[u8]) -> Result<Option<Self>, serde_json::Error> {
        let event = match routing_key {
            routing::USER_UPDATED => Self::UserUpdated(serde_json::from_slice(body)?),
            routing::ZOOM_MEETING_CREATED => Self::MeetingCreated(serde_json::from_slice(body)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

pub struct CourseEventHandler {
    store: Arc<dyn CourseProjectionStore>,
}

impl CourseEventHandler {
    pub fn new(store: Arc<dyn CourseProjectionStore>) -> Self {
        Self { store }
    }

    async fn apply(&self, event: CourseEvent) -> Result<(), RetryableError> {
        match event {
            CourseEvent::UserUpdated(user) => {
                let rows = self
                    .store
                    .set_instructor_username(user.id, &user.username)
                    .await?;
                record_projection_update("instructor_username", rows);
                debug!(
                    target: "course.projections",
                    instructor_id = %user.id,
                    rows,
                    "Instructor username projected"
                );
            }
            CourseEvent::MeetingCreated(meeting) => {
                let rows = self
                    .store
                    .link_module_meeting(meeting.section_module_id, &meeting.zoom_meeting_id)
                    .await?;
                record_projection_update("module_meeting", rows);
                if rows == 0 {
                    info!(
                        target: "course.projections",
                        section_module_id = %meeting.section_module_id,
                        "Meeting created for unknown module"
                    );
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for CourseEventHandler {
    #[instrument(skip_all, name = "course.projections.handle", fields(routing_key = %routing_key))]
    async fn handle(&self, routing_key: &str, body: &[u8]) -> Result<HandleOutcome, RetryableError> {
        match CourseEvent::decode(routing_key, body) {
            Ok(Some(event)) => {
                self.apply(event).await?;
                Ok(HandleOutcome::Applied)
            }
            Ok(None) => Ok(HandleOutcome::Ignored),
            Err(e) => Ok(HandleOutcome::Malformed(e.to_string())),
        }
    }
}
