//! E2E tests for registration and email verification.
//!
//! Test naming: `test_<feature>_<scenario>_<expected_result>`

use auth_service::repositories::{TokenNamespace, UserRepository};
use auth_test_utils::*;
use common::events::routing;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn test_register_then_verify_email_marks_user_verified() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(server.endpoint("/api/v1/auth/register"))
        .json(&register_body("a@b.c", "alice", TEST_PASSWORD))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await?;
    assert_eq!(body["email"], "a@b.c");
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "student");
    assert_eq!(body["email_verified"], false);
    assert!(body.get("password_hash").is_none());

    let token = server
        .only_token_in(TokenNamespace::VerifyEmail)
        .await
        .expect("exactly one verification token");

    let events = server.bus().published_with_key(routing::STUDENT_REGISTERED);
    assert_eq!(events.len(), 1);
    let url = events[0].payload()["email_verification_url"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    assert_eq!(
        url,
        format!("{TEST_GATEWAY_URL}/api/v1/auth/verify-email?token={token}")
    );

    let response = client
        .get(server.endpoint("/api/v1/auth/verify-email"))
        .query(&[("token", token.as_str())])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["email_verified"], true);
    assert!(!body["email_verified_at"].is_null());

    let user = server
        .users()
        .find_by_email("a@b.c")
        .await?
        .expect("user exists");
    assert!(user.email_verified);
    assert!(user.email_verified_at.is_some());
    assert!(server.tokens_in(TokenNamespace::VerifyEmail).await.is_empty());

    // The token is single use.
    let response = client
        .get(server.endpoint("/api/v1/auth/verify-email"))
        .query(&[("token", token.as_str())])
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_register_duplicate_email_case_insensitive_conflicts() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let client = reqwest::Client::new();

    let first = client
        .post(server.endpoint("/api/v1/auth/register"))
        .json(&register_body("Dup@Example.com", "first", TEST_PASSWORD))
        .send()
        .await?;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = client
        .post(server.endpoint("/api/v1/auth/register"))
        .json(&register_body("dup@example.COM", "second", TEST_PASSWORD))
        .send()
        .await?;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let body: Value = second.json().await?;
    assert_eq!(body["error"], "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn test_register_weak_password_returns_validation_error() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = reqwest::Client::new()
        .post(server.endpoint("/api/v1/auth/register"))
        .json(&register_body("weak@lms.test", "weak", "abcdefgh"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await?;
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert!(server.users().all().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_request_email_verify_answers_uniformly() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let client = reqwest::Client::new();
    server
        .seed_user("new@lms.test", "newbie", TEST_PASSWORD, auth_service::models::Role::Student, false)
        .await?;

    for email in ["new@lms.test", "nobody@lms.test"] {
        let response = client
            .post(server.endpoint("/api/v1/auth/request-email-verify"))
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(server.tokens_in(TokenNamespace::VerifyEmail).await.len(), 1);
    assert_eq!(
        server
            .bus()
            .published_with_key(routing::USER_REQUESTED_EMAIL_VERIFICATION)
            .len(),
        1
    );
    Ok(())
}
