//! E2E tests for the admin user management routes.

use auth_service::models::Role;
use auth_test_utils::*;
use common::events::routing;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

fn with_identity(mut request: RequestBuilder, headers: Vec<(&'static str, String)>) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(name, value);
    }
    request
}

#[tokio::test]
async fn test_users_routes_require_admin_role() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let client = Client::new();
    let url = server.endpoint(&format!("/api/v1/users/{}", Uuid::new_v4()));

    let response = client.get(&url).send().await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = with_identity(
        client.get(&url),
        identity_headers(Uuid::new_v4(), "s@lms.test", "student"),
    )
    .send()
    .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = with_identity(client.get(&url), admin_identity()).send().await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_admin_create_update_delete_publishes_events() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let client = Client::new();

    let response = with_identity(client.post(server.endpoint("/api/v1/users")), admin_identity())
        .json(&json!({
            "email": "inst@lms.test",
            "username": "inst",
            "password": TEST_PASSWORD,
            "role": "instructor"
        }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await?;
    assert_eq!(created["status"], "active");
    assert_eq!(created["email_verified"], false);
    let id = created["id"].as_str().unwrap_or_default().to_string();
    let user_url = server.endpoint(&format!("/api/v1/users/{id}"));

    let response = with_identity(client.patch(&user_url), admin_identity())
        .json(&json!({ "username": "instructor-renamed" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await?;
    assert_eq!(updated["username"], "instructor-renamed");

    let events = server.bus().published_with_key(routing::USER_UPDATED);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload()["username"], "instructor-renamed");

    let response = with_identity(client.delete(&user_url), admin_identity())
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(server.bus().published_with_key(routing::USER_CREATED).len(), 1);
    assert_eq!(server.bus().published_with_key(routing::USER_DELETED).len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_admin_cannot_be_banned_or_deleted() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let admin = server
        .seed_user("boss@lms.test", "boss", TEST_PASSWORD, Role::Admin, true)
        .await?;
    let client = Client::new();
    let user_url = server.endpoint(&format!("/api/v1/users/{}", admin.id));

    let response = with_identity(client.patch(&user_url), admin_identity())
        .json(&json!({ "status": "banned" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = with_identity(client.delete(&user_url), admin_identity())
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_banned_user_only_leaves_ban_through_unban() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let user = server
        .seed_verified_user("s@lms.test", "student", TEST_PASSWORD)
        .await?;
    let client = Client::new();
    let user_url = server.endpoint(&format!("/api/v1/users/{}", user.id));

    let response = with_identity(client.patch(&user_url), admin_identity())
        .json(&json!({ "status": "banned" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // Banned users cannot log in.
    let response = client
        .post(server.endpoint("/api/v1/auth/login"))
        .json(&login_body("s@lms.test", TEST_PASSWORD))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = with_identity(client.patch(&user_url), admin_identity())
        .json(&json!({ "status": "active" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = with_identity(
        client.post(server.endpoint(&format!("/api/v1/users/{}/unban", user.id))),
        admin_identity(),
    )
    .send()
    .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "active");
    Ok(())
}
