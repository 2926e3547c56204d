//! HTTP routes for the auth service.

use crate::handlers::{self, auth_handler, users_handler};
use crate::middleware::require_admin;
use crate::services::{AuthService, UserAdminService};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use common::http::apply_standard_layers;
use common::observability::metrics_handler;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserAdminService>,
}

/// Build the application routes.
///
/// - `/health`, `/metrics`: public, unversioned
/// - `/api/v1/auth/*`: credential and session endpoints
/// - `/api/v1/users/*`: admin user management, gated on the gateway-stamped
///   role
pub fn build_routes(state: Arc<AppState>, metrics_handle: Option<PrometheusHandle>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/auth/register", post(auth_handler::register))
        .route("/api/v1/auth/login", post(auth_handler::login))
        .route("/api/v1/auth/logout", post(auth_handler::logout))
        .route("/api/v1/auth/verify", get(auth_handler::verify))
        .route("/api/v1/auth/refresh-token", post(auth_handler::refresh_token))
        .route(
            "/api/v1/auth/forgot-password",
            post(auth_handler::forgot_password),
        )
        .route("/api/v1/auth/verify-otp", post(auth_handler::verify_otp))
        .route(
            "/api/v1/auth/reset-password",
            post(auth_handler::reset_password),
        )
        .route(
            "/api/v1/auth/request-email-verify",
            post(auth_handler::request_email_verify),
        )
        .route("/api/v1/auth/verify-email", get(auth_handler::verify_email))
        .with_state(state.clone());

    let admin_routes = Router::new()
        .route("/api/v1/users", post(users_handler::create_user))
        .route(
            "/api/v1/users/:id",
            get(users_handler::get_user)
                .patch(users_handler::update_user)
                .delete(users_handler::delete_user),
        )
        .route("/api/v1/users/:id/unban", post(users_handler::unban_user))
        .route_layer(middleware::from_fn(require_admin))
        .with_state(state);

    let mut router = public_routes.merge(admin_routes);
    if let Some(handle) = metrics_handle {
        router = router.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(handle),
        );
    }

    apply_standard_layers(router)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
