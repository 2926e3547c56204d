//! `/api/v1/auth/*` handlers.

use crate::errors::AuthError;
use crate::models::{
    ClientInfo, ForgotPasswordRequest, LoginRequest, LoginResponse, LogoutRequest,
    MessageResponse, RefreshRequest, RefreshResponse, RegisterRequest, RequestEmailVerifyRequest,
    ResetPasswordRequest, Role, UserResponse, VerifiedIdentity, VerifyEmailQuery,
    VerifyOtpRequest, VerifyOtpResponse,
};
use crate::observability::record_auth_operation;
use crate::routes::AppState;
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use common::identity::{USER_EMAIL_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

fn observe<T>(operation: &'static str, start: Instant, result: &Result<T, AuthError>) {
    record_auth_operation(
        operation,
        result.as_ref().err().map(AuthError::code),
        start.elapsed(),
    );
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AuthError::InvalidToken("Missing Authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::InvalidToken("Invalid Authorization header format".to_string()))
}

/// Client address as seen by the gateway, falling back to the socket peer.
fn client_info(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientInfo {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let ip = header_str("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| header_str("x-real-ip").map(str::to_string))
        .or_else(|| peer.map(|addr| addr.ip().to_string()));

    ClientInfo {
        ip,
        user_agent: header_str(header::USER_AGENT.as_str()).map(str::to_string),
    }
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthError> {
    let start = Instant::now();
    let result = state.auth.register(payload).await;
    observe("register", start, &result);
    Ok((StatusCode::CREATED, Json(result?)))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let start = Instant::now();
    let client = client_info(&headers, peer.map(|ConnectInfo(addr)| addr));
    let result = state.auth.login(payload, client).await;
    observe("login", start, &result);
    Ok(Json(result?))
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<LogoutRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let start = Instant::now();
    let result = match extract_bearer_token(&headers) {
        Ok(bearer) => state.auth.logout(bearer, &payload.session_id).await,
        Err(e) => Err(e),
    };
    observe("logout", start, &result);
    result?;
    Ok(Json(MessageResponse::new("Logged out")))
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub role: Option<Role>,
}

/// GET /api/v1/auth/verify
///
/// On success the caller's identity is returned both as JSON and as the
/// `X-User-*` headers the gateway copies onto the forwarded request.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<VerifyQuery>,
) -> Result<impl IntoResponse, AuthError> {
    let start = Instant::now();
    let result = match extract_bearer_token(&headers) {
        Ok(bearer) => state.auth.verify(bearer, query.role).await,
        Err(e) => Err(e),
    };
    observe("verify", start, &result);
    let identity: VerifiedIdentity = result?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        USER_ID_HEADER,
        HeaderValue::from_str(&identity.user_id.to_string()).map_err(|_| AuthError::Internal)?,
    );
    response_headers.insert(
        USER_EMAIL_HEADER,
        HeaderValue::from_str(&identity.email).map_err(|_| AuthError::Internal)?,
    );
    response_headers.insert(
        USER_ROLE_HEADER,
        HeaderValue::from_static(identity.role.as_str()),
    );

    Ok((response_headers, Json(identity)))
}

/// POST /api/v1/auth/refresh-token
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AuthError> {
    let start = Instant::now();
    let result = state.auth.refresh(payload).await;
    observe("refresh", start, &result);
    Ok(Json(result?))
}

/// POST /api/v1/auth/forgot-password
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let start = Instant::now();
    let result = state.auth.forgot_password(payload).await;
    observe("forgot_password", start, &result);
    result?;
    Ok(Json(MessageResponse::new(
        "If the email is registered, a one-time code has been sent",
    )))
}

/// POST /api/v1/auth/verify-otp
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, AuthError> {
    let start = Instant::now();
    let result = state.auth.verify_otp(payload).await;
    observe("verify_otp", start, &result);
    Ok(Json(result?))
}

/// POST /api/v1/auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let start = Instant::now();
    let result = state.auth.reset_password(payload).await;
    observe("reset_password", start, &result);
    result?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}

/// POST /api/v1/auth/request-email-verify
pub async fn request_email_verify(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RequestEmailVerifyRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let start = Instant::now();
    let result = state.auth.request_email_verify(payload).await;
    observe("request_email_verify", start, &result);
    result?;
    Ok(Json(MessageResponse::new(
        "If the email is registered and unverified, a verification link has been sent",
    )))
}

/// GET /api/v1/auth/verify-email?token=
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<UserResponse>, AuthError> {
    let start = Instant::now();
    let result = state.auth.verify_email(&query.token).await;
    observe("verify_email", start, &result);
    Ok(Json(result?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def");
    }

    #[test]
    fn test_client_info_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8"));
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();

        let info = client_info(&headers, Some(peer));
        assert_eq!(info.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8"));

        let info = client_info(&HeaderMap::new(), Some(peer));
        assert_eq!(info.ip.as_deref(), Some("127.0.0.1"));
        assert!(info.user_agent.is_none());
    }
}
