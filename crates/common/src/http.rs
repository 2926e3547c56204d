//! HTTP plumbing shared by every service router.
//!
//! - [`ErrorBody`]: the flat `{"error": CODE, "message": text}` JSON body
//!   every service returns on failure.
//! - [`apply_standard_layers`]: request-id, tracing, timeout and request
//!   metrics, applied in the same order everywhere.

use crate::observability::record_http_request;
use axum::{
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Request timeout applied to every route.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response header carrying the correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// JSON error body returned by every service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Build an error response with the shared body shape.
///
/// 401 responses additionally carry `WWW-Authenticate: Bearer`.
pub fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: code.to_string(),
        message: message.into(),
    };
    let mut response = (status, Json(body)).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}

/// Apply the standard middleware stack to a fully-stated router.
///
/// Execution order, outermost first: request-id assignment, request
/// metrics, tracing, timeout, request-id propagation onto the response.
pub fn apply_standard_layers(router: Router) -> Router {
    router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Records method, normalized path, status and latency for every response,
/// including framework rejections (404, 405, 415).
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());
    response
}

/// Collapse identifier-like path segments so metric cardinality stays bounded.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if looks_like_identifier(segment) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn looks_like_identifier(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    let is_uuid = segment.len() == 36
        && segment
            .chars()
            .all(|c| c.is_ascii_hexdigit() || c == '-');
    let is_numeric = segment.chars().all(|c| c.is_ascii_digit());
    is_uuid || is_numeric
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, routing::get};
    use tower::ServiceExt;

    #[test]
    fn test_normalize_path_collapses_ids() {
        assert_eq!(
            normalize_path("/api/v1/files/7f1e2d3c-0000-4000-8000-123456789abc/download"),
            "/api/v1/files/:id/download"
        );
        assert_eq!(
            normalize_path("/api/v1/zoom/meetings/8123456789"),
            "/api/v1/zoom/meetings/:id"
        );
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[tokio::test]
    async fn test_unauthorized_response_carries_challenge() {
        let response = error_response(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "nope");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
    }

    #[tokio::test]
    async fn test_forbidden_response_has_no_challenge() {
        let response = error_response(StatusCode::FORBIDDEN, "FORBIDDEN", "nope");
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[tokio::test]
    async fn test_standard_layers_assign_request_id() {
        let app = apply_standard_layers(Router::new().route("/ping", get(|| async { "pong" })));

        let response = app
            .oneshot(HttpRequest::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(REQUEST_ID_HEADER).is_some());
    }

    #[tokio::test]
    async fn test_standard_layers_echo_incoming_request_id() {
        let app = apply_standard_layers(Router::new().route("/ping", get(|| async { "pong" })));

        let response = app
            .oneshot(
                HttpRequest::get("/ping")
                    .header(REQUEST_ID_HEADER, "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "req-123");
    }
}
