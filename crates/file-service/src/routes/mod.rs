//! HTTP routes for the file service.

use crate::handlers::{self, files};
use crate::services::FileService;
use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use common::http::apply_standard_layers;
use common::observability::metrics_handler;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Room for multipart boundaries and the small text fields around the file.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub files: Arc<FileService>,
}

/// Build the application routes.
///
/// - `/health`, `/metrics`: public, unversioned
/// - `/api/v1/files/*`, `/api/v1/buckets/*`: behind the gateway
pub fn build_routes(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let body_limit = usize::try_from(
        state
            .files
            .max_upload_bytes()
            .saturating_add(MULTIPART_OVERHEAD_BYTES),
    )
    .unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/api/v1/files",
            get(files::list_files)
                .post(files::upload_file)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/api/v1/files/:id",
            get(files::get_file).delete(files::delete_file),
        )
        .route("/api/v1/files/:id/download", get(files::download_file))
        .route("/api/v1/files/:id/presigned-url", get(files::presigned_url))
        .route(
            "/api/v1/buckets/:bucket/files/:id/download",
            get(files::download_bucket_file),
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
