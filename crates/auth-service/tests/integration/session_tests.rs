//! E2E tests for login, verify, refresh, and logout.

use auth_service::models::Role;
use auth_service::repositories::TokenNamespace;
use auth_test_utils::*;
use common::events::routing;
use common::identity::{USER_EMAIL_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

async fn login(server: &TestAuthServer, email: &str, password: &str) -> Result<Value, anyhow::Error> {
    let response = Client::new()
        .post(server.endpoint("/api/v1/auth/login"))
        .json(&login_body(email, password))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(response.json().await?)
}

#[tokio::test]
async fn test_login_unverified_email_returns_401() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_user("a@b.c", "alice", TEST_PASSWORD, Role::Student, false)
        .await?;

    let response = Client::new()
        .post(server.endpoint("/api/v1/auth/login"))
        .json(&login_body("a@b.c", TEST_PASSWORD))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok()),
        Some("Bearer")
    );

    let body: Value = response.json().await?;
    assert_eq!(body["error"], "EMAIL_NOT_VERIFIED");
    assert!(server.tokens_in(TokenNamespace::Session).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_email_look_alike() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_verified_user("a@b.c", "alice", TEST_PASSWORD)
        .await?;
    let client = Client::new();

    for (email, password) in [("a@b.c", "Wrong123!"), ("ghost@b.c", TEST_PASSWORD)] {
        let response = client
            .post(server.endpoint("/api/v1/auth/login"))
            .json(&login_body(email, password))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = response.json().await?;
        assert_eq!(body["error"], "INVALID_CREDENTIALS");
    }
    Ok(())
}

#[tokio::test]
async fn test_login_creates_session_and_bindings() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let user = server
        .seed_verified_user("a@b.c", "alice", TEST_PASSWORD)
        .await?;

    let body = login(&server, "a@b.c", TEST_PASSWORD).await?;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], TEST_ACCESS_TTL.as_secs());
    assert_eq!(body["user"]["id"], user.id.to_string());

    let access = body["access_token"].as_str().unwrap_or_default();
    let refresh = body["refresh_token"].as_str().unwrap_or_default();
    let session_id = body["session_id"].as_str().unwrap_or_default();

    assert_eq!(server.tokens_in(TokenNamespace::Access).await, vec![access.to_string()]);
    assert_eq!(server.tokens_in(TokenNamespace::Refresh).await, vec![refresh.to_string()]);
    assert_eq!(server.tokens_in(TokenNamespace::Session).await, vec![session_id.to_string()]);

    let session_ttl = server
        .store()
        .ttl(&TokenNamespace::Session.key(session_id))
        .await
        .expect("session is live");
    assert!(session_ttl > TEST_ACCESS_TTL);
    assert!(session_ttl <= TEST_REFRESH_TTL);

    assert_eq!(server.bus().published_with_key(routing::USER_LOGGED_IN).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_verify_returns_identity_headers() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let user = server
        .seed_user("teach@lms.test", "teacher", TEST_PASSWORD, Role::Instructor, true)
        .await?;
    let body = login(&server, "teach@lms.test", TEST_PASSWORD).await?;
    let access = body["access_token"].as_str().unwrap_or_default().to_string();
    let client = Client::new();

    let response = client
        .get(server.endpoint("/api/v1/auth/verify"))
        .bearer_auth(&access)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    assert_eq!(header(USER_ID_HEADER), Some(user.id.to_string()));
    assert_eq!(header(USER_EMAIL_HEADER).as_deref(), Some("teach@lms.test"));
    assert_eq!(header(USER_ROLE_HEADER).as_deref(), Some("instructor"));

    // Role mismatch is 403, not 401.
    let response = client
        .get(server.endpoint("/api/v1/auth/verify"))
        .query(&[("role", "admin")])
        .bearer_auth(&access)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client
        .get(server.endpoint("/api/v1/auth/verify"))
        .bearer_auth("not-a-token")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client.get(server.endpoint("/api/v1/auth/verify")).send().await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_logout_revokes_access_token() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_verified_user("a@b.c", "alice", TEST_PASSWORD)
        .await?;
    let body = login(&server, "a@b.c", TEST_PASSWORD).await?;
    let access = body["access_token"].as_str().unwrap_or_default().to_string();
    let session_id = body["session_id"].as_str().unwrap_or_default().to_string();
    let client = Client::new();

    let response = client
        .post(server.endpoint("/api/v1/auth/logout"))
        .bearer_auth(&access)
        .json(&json!({ "session_id": session_id }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(server.endpoint("/api/v1/auth/verify"))
        .bearer_auth(&access)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert!(server.tokens_in(TokenNamespace::Session).await.is_empty());
    assert!(server.tokens_in(TokenNamespace::Refresh).await.is_empty());
    assert_eq!(server.bus().published_with_key(routing::USER_LOGGED_OUT).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_refresh_issues_working_access_token() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_verified_user("a@b.c", "alice", TEST_PASSWORD)
        .await?;
    let body = login(&server, "a@b.c", TEST_PASSWORD).await?;
    let refresh = body["refresh_token"].as_str().unwrap_or_default().to_string();
    let session_id = body["session_id"].as_str().unwrap_or_default().to_string();
    let client = Client::new();

    let response = client
        .post(server.endpoint("/api/v1/auth/refresh-token"))
        .json(&json!({ "refresh_token": refresh, "session_id": session_id }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed: Value = response.json().await?;
    let new_access = refreshed["access_token"].as_str().unwrap_or_default();

    let response = client
        .get(server.endpoint("/api/v1/auth/verify"))
        .bearer_auth(new_access)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // An access token is not accepted where a refresh token is expected.
    let response = client
        .post(server.endpoint("/api/v1/auth/refresh-token"))
        .json(&json!({ "refresh_token": new_access }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
