use common::events::RetryableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for ProjectionError {
    fn from(err: sqlx::Error) -> Self {
        ProjectionError::Database(err.to_string())
    }
}

/// Store failures are transient from the consumer's point of view.
impl From<ProjectionError> for RetryableError {
    fn from(err: ProjectionError) -> Self {
        RetryableError(err.to_string())
    }
}
