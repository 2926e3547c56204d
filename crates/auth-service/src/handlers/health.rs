use crate::models::HealthResponse;
use axum::Json;

/// Liveness probe. Does not check dependencies.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
