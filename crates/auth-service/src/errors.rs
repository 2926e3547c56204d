use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::http::error_response;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email not verified")]
    EmailNotVerified,

    #[error("Account is {0}")]
    AccountNotActive(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Token store error: {0}")]
    TokenStore(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Internal server error")]
    Internal,
}

impl AuthError {
    /// Stable symbolic code sent in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            AuthError::AccountNotActive(_) => "ACCOUNT_NOT_ACTIVE",
            AuthError::InvalidToken(_) => "INVALID_TOKEN",
            AuthError::Forbidden(_) => "FORBIDDEN",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::Conflict(_) => "CONFLICT",
            AuthError::Database(_) => "DATABASE_ERROR",
            AuthError::TokenStore(_) => "TOKEN_STORE_ERROR",
            AuthError::Crypto(_) => "CRYPTO_ERROR",
            AuthError::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::EmailNotVerified
            | AuthError::AccountNotActive(_)
            | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::Database(_)
            | AuthError::TokenStore(_)
            | AuthError::Crypto(_)
            | AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::Validation(msg)
            | AuthError::InvalidToken(msg)
            | AuthError::Forbidden(msg)
            | AuthError::NotFound(msg)
            | AuthError::Conflict(msg) => msg.clone(),
            AuthError::InvalidCredentials => "Invalid email or password".to_string(),
            AuthError::EmailNotVerified => {
                "Email address has not been verified; check your inbox".to_string()
            }
            AuthError::AccountNotActive(status) => format!("Account is {status}"),
            // Internal details are logged, never returned.
            AuthError::Database(detail)
            | AuthError::TokenStore(detail)
            | AuthError::Crypto(detail) => {
                tracing::error!(target: "auth.errors", code = self.code(), detail = %detail, "Request failed");
                "An internal error occurred".to_string()
            }
            AuthError::Internal => "An internal error occurred".to_string(),
        };

        error_response(self.status(), self.code(), message)
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                let what = match db_err.constraint() {
                    Some("users_email_unique") => "email already exists",
                    Some("users_username_unique") => "username already exists",
                    _ => "user already exists",
                };
                return AuthError::Conflict(what.to_string());
            }
            if db_err.is_check_violation() && db_err.constraint() == Some("users_admin_not_banned") {
                return AuthError::Forbidden("cannot ban an admin".to_string());
            }
        }
        AuthError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        AuthError::TokenStore(err.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::header;
    use common::http::ErrorBody;

    async fn body_of(err: AuthError) -> (StatusCode, Option<String>, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, challenge, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_maps_to_400() {
        let (status, _, body) = body_of(AuthError::Validation("bad email".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "VALIDATION_ERROR");
        assert_eq!(body.message, "bad email");
    }

    #[tokio::test]
    async fn test_unauthenticated_variants_carry_challenge() {
        for err in [
            AuthError::InvalidCredentials,
            AuthError::EmailNotVerified,
            AuthError::AccountNotActive("banned".to_string()),
            AuthError::InvalidToken("expired".to_string()),
        ] {
            let (status, challenge, _) = body_of(err).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(challenge.as_deref(), Some("Bearer"));
        }
    }

    #[tokio::test]
    async fn test_internal_errors_hide_detail() {
        let (status, _, body) =
            body_of(AuthError::Database("connection refused to 10.0.0.5".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "DATABASE_ERROR");
        assert!(!body.message.contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_conflict_and_forbidden() {
        let (status, _, body) = body_of(AuthError::Conflict("email already exists".to_string())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.message, "email already exists");

        let (status, challenge, _) = body_of(AuthError::Forbidden("admin".to_string())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(challenge.is_none());
    }
}
