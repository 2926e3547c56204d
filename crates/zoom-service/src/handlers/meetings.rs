//! `/api/v1/zoom/*` handlers.
//!
//! Mutations require the gateway identity. Reads are open but go through
//! [`MeetingView`], which withholds the host link from non-hosts.

use crate::errors::ZoomError;
use crate::models::{CreateMeetingRequest, Meeting, MeetingView, UpdateMeetingRequest};
use crate::observability::record_meeting_operation;
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use common::identity::GatewayIdentity;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

fn observe<T>(operation: &'static str, result: &Result<T, ZoomError>) {
    record_meeting_operation(operation, result.as_ref().err().map(ZoomError::code));
}

/// POST /api/v1/zoom/meetings
pub async fn create_meeting(
    State(state): State<Arc<AppState>>,
    identity: GatewayIdentity,
    Json(payload): Json<CreateMeetingRequest>,
) -> Result<(StatusCode, Json<Meeting>), ZoomError> {
    let created_by = Uuid::parse_str(&identity.user_id).ok();

    let result = state.meetings.create(payload, created_by).await;
    observe("create", &result);
    Ok((StatusCode::CREATED, Json(result?)))
}

/// GET /api/v1/zoom/meetings/:id
pub async fn get_meeting(
    State(state): State<Arc<AppState>>,
    caller: Option<GatewayIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<MeetingView>, ZoomError> {
    let meeting = state.meetings.get(id).await?;
    Ok(Json(MeetingView::for_caller(meeting, caller.as_ref())))
}

/// GET /api/v1/zoom/modules/:section_module_id/meeting
pub async fn get_module_meeting(
    State(state): State<Arc<AppState>>,
    caller: Option<GatewayIdentity>,
    Path(section_module_id): Path<Uuid>,
) -> Result<Json<MeetingView>, ZoomError> {
    let meeting = state.meetings.get_by_module(section_module_id).await?;
    Ok(Json(MeetingView::for_caller(meeting, caller.as_ref())))
}

/// PATCH /api/v1/zoom/meetings/:id
pub async fn update_meeting(
    State(state): State<Arc<AppState>>,
    identity: GatewayIdentity,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMeetingRequest>,
) -> Result<Json<Meeting>, ZoomError> {
    debug!(target: "zoom.handlers", meeting_id = %id, user_id = %identity.user_id, "Updating meeting");
    let result = state.meetings.update(id, payload).await;
    observe("update", &result);
    Ok(Json(result?))
}

/// DELETE /api/v1/zoom/meetings/:id
pub async fn delete_meeting(
    State(state): State<Arc<AppState>>,
    identity: GatewayIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ZoomError> {
    debug!(target: "zoom.handlers", meeting_id = %id, user_id = %identity.user_id, "Deleting meeting");
    let result = state.meetings.delete(id).await;
    observe("delete", &result);
    result?;
    Ok(StatusCode::NO_CONTENT)
}
