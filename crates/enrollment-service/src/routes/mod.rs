//! HTTP routes for the enrollment service.
//!
//! The service is a bus consumer; HTTP only exposes liveness and metrics.

use crate::handlers;
use axum::{routing::get, Router};
use common::http::apply_standard_layers;
use common::observability::metrics_handler;
use metrics_exporter_prometheus::PrometheusHandle;

pub fn build_routes(metrics_handle: Option<PrometheusHandle>) -> Router {
    let mut router = Router::new().route("/health", get(handlers::health_check));
    if let Some(handle) = metrics_handle {
        router = router.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(handle),
        );
    }

    apply_standard_layers(router)
}
