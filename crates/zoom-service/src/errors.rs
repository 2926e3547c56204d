use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::http::error_response;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZoomError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The meeting provider rejected or failed the call.
    #[error("Meeting provider error: {0}")]
    Provider(String),

    /// The provider could not be reached or did not answer in time.
    #[error("Meeting provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl ZoomError {
    pub fn code(&self) -> &'static str {
        match self {
            ZoomError::Validation(_) => "VALIDATION_ERROR",
            ZoomError::NotFound(_) => "NOT_FOUND",
            ZoomError::Conflict(_) => "CONFLICT",
            ZoomError::Provider(_) => "PROVIDER_ERROR",
            ZoomError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            ZoomError::Database(_) => "DATABASE_ERROR",
            ZoomError::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ZoomError::Validation(_) => StatusCode::BAD_REQUEST,
            ZoomError::NotFound(_) => StatusCode::NOT_FOUND,
            ZoomError::Conflict(_) => StatusCode::CONFLICT,
            ZoomError::Provider(_) => StatusCode::BAD_GATEWAY,
            ZoomError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ZoomError::Database(_) | ZoomError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ZoomError {
    fn into_response(self) -> Response {
        let message = match &self {
            ZoomError::Validation(msg) | ZoomError::NotFound(msg) | ZoomError::Conflict(msg) => {
                msg.clone()
            }
            ZoomError::Provider(detail) | ZoomError::ProviderUnavailable(detail) => {
                tracing::warn!(target: "zoom.errors", code = self.code(), detail = %detail, "Provider call failed");
                "The meeting provider could not complete the request".to_string()
            }
            ZoomError::Database(detail) => {
                tracing::error!(target: "zoom.errors", code = self.code(), detail = %detail, "Request failed");
                "An internal error occurred".to_string()
            }
            ZoomError::Internal => "An internal error occurred".to_string(),
        };

        error_response(self.status(), self.code(), message)
    }
}

impl From<sqlx::Error> for ZoomError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return ZoomError::Conflict(
                    "a meeting already exists for this module".to_string(),
                );
            }
        }
        ZoomError::Database(err.to_string())
    }
}
