//! E2E tests for the forgot-password, verify-OTP, reset-password flow.

use auth_service::repositories::TokenNamespace;
use auth_test_utils::*;
use common::events::routing;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

#[tokio::test]
async fn test_forgot_password_three_step_flow() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_verified_user("a@b.c", "alice", TEST_PASSWORD)
        .await?;
    let client = Client::new();

    let response = client
        .post(server.endpoint("/api/v1/auth/forgot-password"))
        .json(&json!({ "email": "a@b.c" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let events = server.bus().published_with_key(routing::USER_FORGOT_PASSWORD);
    assert_eq!(events.len(), 1);
    let otp = events[0].payload()["otp"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    assert_eq!(otp.len(), 6);
    assert!(otp.chars().all(|c| c.is_ascii_digit()));

    let response = client
        .post(server.endpoint("/api/v1/auth/verify-otp"))
        .json(&json!({ "email": "a@b.c", "otp": otp }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    let reset_token = body["reset_token"].as_str().unwrap_or_default().to_string();
    assert!(!reset_token.is_empty());

    let response = client
        .post(server.endpoint("/api/v1/auth/reset-password"))
        .json(&json!({ "reset_token": reset_token, "new_password": TEST_NEW_PASSWORD }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(server.tokens_in(TokenNamespace::ForgotPasswordOtp).await.is_empty());
    assert!(server.tokens_in(TokenNamespace::ResetPassword).await.is_empty());
    assert_eq!(server.bus().published_with_key(routing::USER_RESET_PASSWORD).len(), 1);

    let response = client
        .post(server.endpoint("/api/v1/auth/login"))
        .json(&login_body("a@b.c", TEST_NEW_PASSWORD))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(server.endpoint("/api/v1/auth/login"))
        .json(&login_body("a@b.c", TEST_PASSWORD))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Replaying the reset token fails.
    let response = client
        .post(server.endpoint("/api/v1/auth/reset-password"))
        .json(&json!({ "reset_token": reset_token, "new_password": TEST_NEW_PASSWORD }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_forgot_password_unknown_email_is_indistinguishable() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = Client::new()
        .post(server.endpoint("/api/v1/auth/forgot-password"))
        .json(&json!({ "email": "ghost@lms.test" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(server.bus().published().is_empty());
    assert!(server.tokens_in(TokenNamespace::ForgotPasswordOtp).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_verify_otp_for_other_email_does_not_consume() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_verified_user("a@b.c", "alice", TEST_PASSWORD)
        .await?;
    server
        .seed_verified_user("m@b.c", "mallory", TEST_PASSWORD)
        .await?;
    let client = Client::new();

    client
        .post(server.endpoint("/api/v1/auth/forgot-password"))
        .json(&json!({ "email": "a@b.c" }))
        .send()
        .await?;
    let otp = server.bus().published_with_key(routing::USER_FORGOT_PASSWORD)[0].payload()["otp"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let response = client
        .post(server.endpoint("/api/v1/auth/verify-otp"))
        .json(&json!({ "email": "m@b.c", "otp": otp }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        server.tokens_in(TokenNamespace::ForgotPasswordOtp).await,
        vec![otp]
    );
    Ok(())
}
