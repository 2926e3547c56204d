//! Applies user, course and offering rename events to the names denormalized
//! onto enrollment rows.

use crate::models::events::{CourseUpdated, OfferingUpdated, UserUpdated};
use crate::observability::record_projection_update;
use crate::repositories::enrollments::ProjectedName;
use crate::repositories::EnrollmentProjectionStore;
use async_trait::async_trait;
use common::events::{routing, EventHandler, HandleOutcome, RetryableError};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

pub const QUEUE: &str = "enrollment.queue";

pub const ROUTING_KEYS: &[&str] = &[
    routing::USER_UPDATED,
    routing::COURSE_UPDATED,
    routing::OFFERING_UPDATED,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentEvent {
    UserUpdated(UserUpdated),
    CourseUpdated(CourseUpdated),
    OfferingUpdated(OfferingUpdated),
}

impl EnrollmentEvent {
    /// `Ok(None)` for keys this service does not handle.
    pub fn decode(routing_key: &str, body: &[u8]) -> Result<Option<Self>, serde_json::Error> {
        let event = match routing_key {
            routing::USER_UPDATED => Self::UserUpdated(serde_json::from_slice(body)?),
            routing::COURSE_UPDATED => Self::CourseUpdated(serde_json::from_slice(body)?),
            routing::OFFERING_UPDATED => Self::OfferingUpdated(serde_json::from_slice(body)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    fn projection(&self) -> (ProjectedName, Uuid, &str) {
        match self {
            Self::UserUpdated(e) => (ProjectedName::StudentUsername, e.id, e.username.as_str()),
            Self::CourseUpdated(e) => (ProjectedName::CourseName, e.id, e.name.as_str()),
            Self::OfferingUpdated(e) => (ProjectedName::OfferingName, e.id, e.name.as_str()),
        }
    }
}

pub struct EnrollmentEventHandler {
    store: Arc<dyn EnrollmentProjectionStore>,
}

impl EnrollmentEventHandler {
    pub fn new(store: Arc<dyn EnrollmentProjectionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for EnrollmentEventHandler {
    #[instrument(skip_all, name = "enrollment.projections.handle", fields(routing_key = %routing_key))]
    async fn handle(&self, routing_key: &str, body: &[u8]) -> Result<HandleOutcome, RetryableError> {
        let event = match EnrollmentEvent::decode(routing_key, body) {
            Ok(Some(event)) => event,
            Ok(None) => return Ok(HandleOutcome::Ignored),
            Err(e) => return Ok(HandleOutcome::Malformed(e.to_string())),
        };

        let (column, subject_id, value) = event.projection();
        let rows = self.store.set_name(column, subject_id, value).await?;
        record_projection_update(column.as_str(), rows);
        debug!(
            target: "enrollment.projections",
            column = column.as_str(),
            subject_id = %subject_id,
            rows,
            "Enrollment projection updated"
        );
        Ok(HandleOutcome::Applied)
    }
}
