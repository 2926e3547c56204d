use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::http::error_response;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No gateway identity on a route that needs one.
    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    #[error("Object store error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl FileError {
    pub fn code(&self) -> &'static str {
        match self {
            FileError::Validation(_) => "VALIDATION_ERROR",
            FileError::Unauthenticated => "UNAUTHORIZED",
            FileError::Forbidden(_) => "FORBIDDEN",
            FileError::NotFound(_) => "NOT_FOUND",
            FileError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            FileError::Storage(_) => "STORAGE_ERROR",
            FileError::Database(_) => "DATABASE_ERROR",
            FileError::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            FileError::Validation(_) => StatusCode::BAD_REQUEST,
            FileError::Unauthenticated => StatusCode::UNAUTHORIZED,
            FileError::Forbidden(_) => StatusCode::FORBIDDEN,
            FileError::NotFound(_) => StatusCode::NOT_FOUND,
            FileError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            FileError::Storage(_) | FileError::Database(_) | FileError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for FileError {
    fn into_response(self) -> Response {
        let message = match &self {
            FileError::Validation(msg) | FileError::Forbidden(msg) | FileError::NotFound(msg) => {
                msg.clone()
            }
            FileError::Unauthenticated => "Authentication required".to_string(),
            FileError::PayloadTooLarge { .. } => self.to_string(),
            FileError::Storage(detail) | FileError::Database(detail) => {
                tracing::error!(target: "file.errors", code = self.code(), detail = %detail, "Request failed");
                "An internal error occurred".to_string()
            }
            FileError::Internal => "An internal error occurred".to_string(),
        };

        error_response(self.status(), self.code(), message)
    }
}

impl From<sqlx::Error> for FileError {
    fn from(err: sqlx::Error) -> Self {
        FileError::Database(err.to_string())
    }
}
