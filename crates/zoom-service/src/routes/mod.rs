//! HTTP routes for the zoom service.

use crate::handlers::{self, meetings};
use crate::services::MeetingService;
use axum::{
    routing::{get, post},
    Router,
};
use common::http::apply_standard_layers;
use common::observability::metrics_handler;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub meetings: Arc<MeetingService>,
}

/// Build the application routes.
///
/// - `/health`, `/metrics`: public, unversioned
/// - `/api/v1/zoom/*`: meeting lifecycle, behind the gateway
pub fn build_routes(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/zoom/meetings", post(meetings::create_meeting))
        .route(
            "/api/v1/zoom/meetings/:id",
            get(meetings::get_meeting)
                .patch(meetings::update_meeting)
                .delete(meetings::delete_meeting),
        )
        .route(
            "/api/v1/zoom/modules/:section_module_id/meeting",
            get(meetings::get_module_meeting),
        )
        .with_state(state);

    let mut router = api_routes;
    if let Some(handle) = metrics_handle {
        router = router.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(handle),
        );
    }

    apply_standard_layers(router)
}
