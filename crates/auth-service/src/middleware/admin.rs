//! Admin gate for the user management routes.
//!
//! The gateway has already verified the bearer and stamped the caller's
//! identity headers; this only checks the stamped role.

use crate::errors::AuthError;
use axum::{extract::Request, middleware::Next, response::IntoResponse};
use common::identity::GatewayIdentity;
use tracing::instrument;

#[instrument(skip_all, name = "auth.middleware.admin")]
pub async fn require_admin(req: Request, next: Next) -> Result<impl IntoResponse, AuthError> {
    let identity = GatewayIdentity::from_headers(req.headers()).ok_or_else(|| {
        tracing::debug!(target: "auth.middleware.admin", "Missing gateway identity");
        AuthError::InvalidToken("missing caller identity".to_string())
    })?;

    if !identity.is_admin() {
        tracing::debug!(target: "auth.middleware.admin", user_id = %identity.user_id, "Non-admin caller");
        return Err(AuthError::Forbidden("admin role required".to_string()));
    }

    Ok(next.run(req).await)
}
