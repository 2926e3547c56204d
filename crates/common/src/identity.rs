//! Identity stamped onto forwarded requests by the edge gateway.
//!
//! The gateway calls the auth service's verify endpoint, then copies the
//! returned `X-User-Id`, `X-User-Email` and `X-User-Role` headers onto the
//! request it forwards. Downstream services trust those headers and read
//! them through the [`GatewayIdentity`] extractor.

use crate::http::error_response;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_EMAIL_HEADER: &str = "X-User-Email";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_INSTRUCTOR: &str = "instructor";

/// Caller identity as forwarded by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayIdentity {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl GatewayIdentity {
    /// Read the identity headers, requiring at least a non-empty user id.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            user_id: read(USER_ID_HEADER)?,
            email: read(USER_EMAIL_HEADER),
            role: read(USER_ROLE_HEADER),
        })
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ROLE_ADMIN)
    }

    #[must_use]
    pub fn is_instructor(&self) -> bool {
        self.role.as_deref() == Some(ROLE_INSTRUCTOR)
    }
}

/// Rejection when the gateway headers are missing.
#[derive(Debug)]
pub struct MissingIdentity;

impl IntoResponse for MissingIdentity {
    fn into_response(self) -> Response {
        error_response(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            format!("missing {USER_ID_HEADER} header"),
        )
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for GatewayIdentity
where
    S: Send + Sync,
{
    type Rejection = MissingIdentity;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        GatewayIdentity::from_headers(&parts.headers).ok_or(MissingIdentity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_from_headers_reads_all_fields() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-1"));
        headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static("a@b.c"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("admin"));

        let identity = GatewayIdentity::from_headers(&headers).unwrap();
        assert_eq!(identity.user_id, "u-1");
        assert_eq!(identity.email.as_deref(), Some("a@b.c"));
        assert!(identity.is_admin());
    }

    #[test]
    fn test_from_headers_requires_user_id() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("admin"));
        assert!(GatewayIdentity::from_headers(&headers).is_none());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert!(GatewayIdentity::from_headers(&headers).is_none());
    }

    #[test]
    fn test_student_is_not_admin() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-2"));
        headers.insert(USER_ROLE_HEADER, HeaderValue::from_static("student"));
        let identity = GatewayIdentity::from_headers(&headers).unwrap();
        assert!(!identity.is_admin());
        assert!(!identity.is_instructor());
    }
}
