//! Payloads published on the event bus. Each is a flat JSON object with
//! RFC 3339 UTC timestamps.

use super::{Role, User, UserStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `user.user.created` / `user.user.updated`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEvent {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub status: UserStatus,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserEvent {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
            status: user.status,
            email_verified: user.email_verified,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// `user.user.deleted`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDeletedEvent {
    pub id: Uuid,
    pub deleted_at: DateTime<Utc>,
}

/// `auth.student.registered`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRegisteredEvent {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub status: UserStatus,
    pub email_verified: bool,
    pub email_verification_url: String,
    pub created_at: DateTime<Utc>,
}

/// `auth.user.logged_in`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedInEvent {
    pub user_id: Uuid,
    pub email: String,
    pub session_id: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub logged_in_at: DateTime<Utc>,
}

/// `auth.user.logged_out`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedOutEvent {
    pub user_id: Uuid,
    pub session_id: String,
    pub logged_out_at: DateTime<Utc>,
}

/// `auth.user.forgot_password`
///
/// Carries the OTP for the notification service to mail out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordEvent {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub otp: String,
    pub expires_at: DateTime<Utc>,
}

/// `auth.user.reset_password`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetEvent {
    pub user_id: Uuid,
    pub email: String,
    pub reset_at: DateTime<Utc>,
}

/// `auth.user.requested_email_verification`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailVerificationRequestedEvent {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub email_verification_url: String,
}
