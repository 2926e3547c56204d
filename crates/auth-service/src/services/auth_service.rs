//! Credential and session lifecycle.
//!
//! Signed tokens only authenticate; every protected decision also requires
//! the matching binding to exist in the token store. Bus publishes happen
//! after the local state change and never fail the operation.

use crate::config::AuthSettings;
use crate::crypto::{self, jwt::TokenMinter, jwt::TokenUse};
use crate::errors::AuthError;
use crate::models::events::{
    EmailVerificationRequestedEvent, ForgotPasswordEvent, LoggedInEvent, LoggedOutEvent,
    PasswordResetEvent, StudentRegisteredEvent, UserEvent,
};
use crate::models::{
    ClientInfo, ForgotPasswordRequest, LoginRequest, LoginResponse, NewUser, RefreshRequest,
    RefreshResponse, RegisterRequest, RequestEmailVerifyRequest, ResetPasswordRequest, Role,
    Session, User, UserResponse, UserStatus, VerifiedIdentity, VerifyOtpRequest,
    VerifyOtpResponse,
};
use crate::observability::record_token_verification;
use crate::repositories::token_store::{OTP_TTL, RESET_TOKEN_TTL, VERIFY_EMAIL_TTL};
use crate::repositories::{Bindings, TokenNamespace, TokenStore, UserRepository};
use crate::services::validation::{normalize_email, validate_password, validate_username};
use chrono::Utc;
use common::events::{routing, EventPublisher};
use common::secret::ExposeSecret;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Attempts at finding an unused OTP before giving up.
const MAX_OTP_ATTEMPTS: usize = 5;

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    bindings: Bindings,
    minter: TokenMinter,
    publisher: Arc<dyn EventPublisher>,
    bcrypt_cost: u32,
    api_gateway_url: String,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        store: Arc<dyn TokenStore>,
        publisher: Arc<dyn EventPublisher>,
        settings: &AuthSettings,
    ) -> Self {
        Self {
            users,
            bindings: Bindings::new(store),
            minter: TokenMinter::new(
                settings.jwt_secret_bytes(),
                settings.access_token_ttl,
                settings.refresh_token_ttl,
            ),
            publisher,
            bcrypt_cost: settings.bcrypt_cost,
            api_gateway_url: settings.api_gateway_url.clone(),
        }
    }

    pub fn minter(&self) -> &TokenMinter {
        &self.minter
    }

    /// Link placed in verification mails.
    pub fn verification_url(&self, token: &str) -> String {
        format!(
            "{}/api/v1/auth/verify-email?token={}",
            self.api_gateway_url, token
        )
    }

    async fn publish<T: Serialize + Sync>(&self, routing_key: &str, payload: &T) {
        if let Err(e) = self.publisher.publish(routing_key, payload).await {
            warn!(target: "auth.events", routing_key = %routing_key, error = %e, "Event publish failed; state change kept");
        }
    }

    /// Student self-registration.
    ///
    /// The user row is never rolled back: if the verify-email binding cannot
    /// be stored the account exists unverified and the student recovers
    /// through `request_email_verify`.
    #[instrument(skip_all, name = "auth.register")]
    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse, AuthError> {
        let email = normalize_email(&request.email)?;
        let username = validate_username(&request.username)?;
        validate_password(request.password.expose_secret())?;

        if self.users.email_exists(&email).await? {
            return Err(AuthError::Conflict("email already exists".to_string()));
        }
        if self.users.username_exists(&username).await? {
            return Err(AuthError::Conflict("username already exists".to_string()));
        }

        let password_hash = crypto::hash_password(request.password.expose_secret(), self.bcrypt_cost)?;

        let user = self
            .users
            .insert(NewUser {
                email,
                username,
                password_hash,
                role: Role::Student,
                status: UserStatus::Active,
                email_verified: false,
            })
            .await?;

        info!(target: "auth.register", user_id = %user.id, "Student registered");

        let token = crypto::generate_token()?;
        if let Err(e) = self
            .bindings
            .bind(TokenNamespace::VerifyEmail, &token, user.id, VERIFY_EMAIL_TTL)
            .await
        {
            error!(target: "auth.register", user_id = %user.id, error = %e, "Failed to store verify-email token; user must request a new one");
            return Ok(UserResponse::from(&user));
        }

        let event = StudentRegisteredEvent {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
            status: user.status,
            email_verified: user.email_verified,
            email_verification_url: self.verification_url(&token),
            created_at: user.created_at,
        };
        self.publish(routing::STUDENT_REGISTERED, &event).await;

        Ok(UserResponse::from(&user))
    }

    #[instrument(skip_all, name = "auth.login")]
    pub async fn login(
        &self,
        request: LoginRequest,
        client: ClientInfo,
    ) -> Result<LoginResponse, AuthError> {
        let email = normalize_email(&request.email)?;
        let password = request.password.expose_secret();

        let Some(user) = self.users.find_by_email(&email).await? else {
            crypto::verify_against_dummy(password);
            return Err(AuthError::InvalidCredentials);
        };

        if !crypto::verify_password(password, &user.password_hash)? {
            debug!(target: "auth.login", user_id = %user.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        if user.status != UserStatus::Active {
            return Err(AuthError::AccountNotActive(user.status.to_string()));
        }
        if !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        let access = self.minter.issue_access(&user)?;
        let refresh = self.minter.issue_refresh(&user)?;
        let session_id = crypto::generate_token()?;

        // Access binding, then refresh binding, then the session record.
        self.bindings
            .bind(
                TokenNamespace::Access,
                &access.token,
                user.id,
                self.minter.access_ttl(),
            )
            .await?;
        self.bindings
            .bind(
                TokenNamespace::Refresh,
                &refresh.token,
                user.id,
                self.minter.refresh_ttl(),
            )
            .await?;

        let now = Utc::now();
        let session = Session {
            session_id: session_id.clone(),
            user_id: user.id,
            access_token: access.token.clone(),
            refresh_token: refresh.token.clone(),
            ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
            created_at: now,
            expires_at: refresh.expires_at,
            last_activity: now,
        };
        self.bindings
            .put_session(&session, self.minter.refresh_ttl())
            .await?;

        info!(target: "auth.login", user_id = %user.id, "User logged in");

        let event = LoggedInEvent {
            user_id: user.id,
            email: user.email.clone(),
            session_id: session_id.clone(),
            ip: client.ip,
            user_agent: client.user_agent,
            logged_in_at: now,
        };
        self.publish(routing::USER_LOGGED_IN, &event).await;

        Ok(LoginResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            session_id,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.minter.access_ttl().as_secs(),
            user: UserResponse::from(&user),
        })
    }

    /// Authenticate a bearer access token: valid signature, unexpired, and
    /// still bound in the token store.
    async fn authenticate(&self, bearer: &str) -> Result<crate::crypto::jwt::Claims, AuthError> {
        let claims = match self.minter.verify_use(bearer, TokenUse::Access) {
            Ok(claims) => claims,
            Err(e) => {
                record_token_verification(token_error_outcome(&e));
                return Err(e.into());
            }
        };

        match self
            .bindings
            .user_for(TokenNamespace::Access, bearer)
            .await?
        {
            Some(user_id) if user_id == claims.user_id => Ok(claims),
            _ => {
                record_token_verification("revoked");
                Err(AuthError::InvalidToken("token has been revoked".to_string()))
            }
        }
    }

    /// Gateway authorization check.
    #[instrument(skip_all, name = "auth.verify", fields(required_role = ?required_role))]
    pub async fn verify(
        &self,
        bearer: &str,
        required_role: Option<Role>,
    ) -> Result<VerifiedIdentity, AuthError> {
        let claims = self.authenticate(bearer).await?;

        if let Some(required) = required_role {
            if claims.role != required {
                record_token_verification("forbidden");
                return Err(AuthError::Forbidden(format!(
                    "requires role {}",
                    required
                )));
            }
        }

        record_token_verification("ok");
        Ok(VerifiedIdentity {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
        })
    }

    /// Revoke a session owned by the caller. A session that no longer exists
    /// is treated as already logged out.
    #[instrument(skip_all, name = "auth.logout")]
    pub async fn logout(&self, bearer: &str, session_id: &str) -> Result<(), AuthError> {
        let claims = self.authenticate(bearer).await?;

        let Some(session) = self.bindings.session(session_id).await? else {
            debug!(target: "auth.logout", user_id = %claims.user_id, "Session already gone");
            self.bindings.revoke(TokenNamespace::Access, bearer).await?;
            return Ok(());
        };
        if session.user_id != claims.user_id {
            return Err(AuthError::Forbidden(
                "session belongs to another user".to_string(),
            ));
        }

        self.bindings
            .revoke(TokenNamespace::Access, &session.access_token)
            .await?;
        if session.access_token != bearer {
            self.bindings.revoke(TokenNamespace::Access, bearer).await?;
        }
        self.bindings
            .revoke(TokenNamespace::Refresh, &session.refresh_token)
            .await?;
        self.bindings.revoke_session(session_id).await?;

        info!(target: "auth.logout", user_id = %claims.user_id, "User logged out");

        let event = LoggedOutEvent {
            user_id: claims.user_id,
            session_id: session_id.to_string(),
            logged_out_at: Utc::now(),
        };
        self.publish(routing::USER_LOGGED_OUT, &event).await;

        Ok(())
    }

    /// Mint a new access token from a bound refresh token. Refresh tokens
    /// are not rotated.
    #[instrument(skip_all, name = "auth.refresh")]
    pub async fn refresh(&self, request: RefreshRequest) -> Result<RefreshResponse, AuthError> {
        let claims = self
            .minter
            .verify_use(&request.refresh_token, TokenUse::Refresh)?;

        match self
            .bindings
            .user_for(TokenNamespace::Refresh, &request.refresh_token)
            .await?
        {
            Some(user_id) if user_id == claims.user_id => {}
            _ => {
                return Err(AuthError::InvalidToken(
                    "refresh token has been revoked".to_string(),
                ))
            }
        }

        // Re-read the user so role and status in the new claims are current.
        let user = self
            .users
            .find_by_id(claims.user_id)
            .await?
            .ok_or_else(|| AuthError::InvalidToken("user no longer exists".to_string()))?;
        if user.status != UserStatus::Active {
            return Err(AuthError::AccountNotActive(user.status.to_string()));
        }

        let access = self.minter.issue_access(&user)?;
        self.bindings
            .bind(
                TokenNamespace::Access,
                &access.token,
                user.id,
                self.minter.access_ttl(),
            )
            .await?;

        if let Some(session_id) = request.session_id.as_deref() {
            self.touch_session(session_id, &user, &request.refresh_token, &access.token)
                .await?;
        }

        Ok(RefreshResponse {
            access_token: access.token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.minter.access_ttl().as_secs(),
        })
    }

    /// Point a session at its new access token. Sessions not owned by the
    /// refreshing user, or issued with a different refresh token, are left
    /// alone.
    async fn touch_session(
        &self,
        session_id: &str,
        user: &User,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<(), AuthError> {
        let Some(mut session) = self.bindings.session(session_id).await? else {
            return Ok(());
        };
        if session.user_id != user.id || session.refresh_token != refresh_token {
            debug!(target: "auth.refresh", user_id = %user.id, "Session not owned by refresh token; not updated");
            return Ok(());
        }

        let now = Utc::now();
        let remaining = (session.expires_at - now)
            .to_std()
            .unwrap_or(Duration::from_secs(1));

        self.bindings
            .revoke(TokenNamespace::Access, &session.access_token)
            .await?;
        session.access_token = access_token.to_string();
        session.last_activity = now;
        self.bindings.put_session(&session, remaining).await
    }

    /// Start a password reset. Answers identically whether or not the email
    /// is registered.
    #[instrument(skip_all, name = "auth.forgot_password")]
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> Result<(), AuthError> {
        let email = normalize_email(&request.email)?;

        let Some(user) = self.users.find_by_email(&email).await? else {
            debug!(target: "auth.forgot_password", "No account for email");
            return Ok(());
        };

        let mut issued = None;
        for _ in 0..MAX_OTP_ATTEMPTS {
            let otp = crypto::generate_otp()?;
            if self
                .bindings
                .bind_if_absent(TokenNamespace::ForgotPasswordOtp, &otp, user.id, OTP_TTL)
                .await?
            {
                issued = Some(otp);
                break;
            }
        }
        let Some(otp) = issued else {
            error!(target: "auth.forgot_password", user_id = %user.id, "Could not find a free OTP");
            return Err(AuthError::Internal);
        };

        info!(target: "auth.forgot_password", user_id = %user.id, "Password reset OTP issued");

        let expires_in = chrono::Duration::from_std(OTP_TTL).map_err(|_| AuthError::Internal)?;
        let event = ForgotPasswordEvent {
            user_id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            otp,
            expires_at: Utc::now() + expires_in,
        };
        self.publish(routing::USER_FORGOT_PASSWORD, &event).await;

        Ok(())
    }

    /// Exchange an OTP for a reset token. The OTP must be bound to the
    /// account owning `email`; a mismatch leaves the binding in place.
    #[instrument(skip_all, name = "auth.verify_otp")]
    pub async fn verify_otp(
        &self,
        request: VerifyOtpRequest,
    ) -> Result<VerifyOtpResponse, AuthError> {
        let email = normalize_email(&request.email)?;
        let otp = request.otp.trim();
        if otp.len() != crypto::OTP_DIGITS || !otp.chars().all(|c| c.is_ascii_digit()) {
            return Err(AuthError::Validation("OTP must be 6 digits".to_string()));
        }

        let invalid = || AuthError::InvalidToken("invalid or expired OTP".to_string());

        let user = self.users.find_by_email(&email).await?.ok_or_else(invalid)?;
        let bound = self
            .bindings
            .user_for(TokenNamespace::ForgotPasswordOtp, otp)
            .await?;
        if bound != Some(user.id) {
            return Err(invalid());
        }

        // Consume before issuing so two concurrent exchanges cannot both win.
        if self
            .bindings
            .consume(TokenNamespace::ForgotPasswordOtp, otp)
            .await?
            != Some(user.id)
        {
            return Err(invalid());
        }

        let reset_token = crypto::generate_token()?;
        self.bindings
            .bind(
                TokenNamespace::ResetPassword,
                &reset_token,
                user.id,
                RESET_TOKEN_TTL,
            )
            .await?;

        info!(target: "auth.verify_otp", user_id = %user.id, "OTP exchanged for reset token");

        Ok(VerifyOtpResponse { reset_token })
    }

    /// Set a new password with a reset token. The password is validated
    /// before the token is consumed so a rejected password does not burn it.
    #[instrument(skip_all, name = "auth.reset_password")]
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), AuthError> {
        let new_password = request.new_password.expose_secret();
        validate_password(new_password)?;

        let user_id = self
            .bindings
            .consume(TokenNamespace::ResetPassword, request.reset_token.trim())
            .await?
            .ok_or_else(|| AuthError::InvalidToken("invalid or expired reset token".to_string()))?;

        let password_hash = crypto::hash_password(new_password, self.bcrypt_cost)?;
        self.users.update_password(user_id, &password_hash).await?;

        info!(target: "auth.reset_password", user_id = %user_id, "Password reset");

        if let Some(user) = self.users.find_by_id(user_id).await? {
            let event = PasswordResetEvent {
                user_id,
                email: user.email,
                reset_at: Utc::now(),
            };
            self.publish(routing::USER_RESET_PASSWORD, &event).await;
        }

        Ok(())
    }

    /// Issue a fresh verify-email token. Answers identically for unknown
    /// and already-verified emails.
    #[instrument(skip_all, name = "auth.request_email_verify")]
    pub async fn request_email_verify(
        &self,
        request: RequestEmailVerifyRequest,
    ) -> Result<(), AuthError> {
        let email = normalize_email(&request.email)?;

        let Some(user) = self.users.find_by_email(&email).await? else {
            return Ok(());
        };
        if user.email_verified {
            debug!(target: "auth.request_email_verify", user_id = %user.id, "Already verified");
            return Ok(());
        }

        let token = crypto::generate_token()?;
        self.bindings
            .bind(TokenNamespace::VerifyEmail, &token, user.id, VERIFY_EMAIL_TTL)
            .await?;

        let event = EmailVerificationRequestedEvent {
            user_id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            email_verification_url: self.verification_url(&token),
        };
        self.publish(routing::USER_REQUESTED_EMAIL_VERIFICATION, &event)
            .await;

        Ok(())
    }

    /// Consume a verify-email token and mark the address verified.
    #[instrument(skip_all, name = "auth.verify_email")]
    pub async fn verify_email(&self, token: &str) -> Result<UserResponse, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Validation("token is required".to_string()));
        }

        let user_id = self
            .bindings
            .consume(TokenNamespace::VerifyEmail, token)
            .await?
            .ok_or_else(|| {
                AuthError::InvalidToken("invalid or expired verification token".to_string())
            })?;

        let user = self
            .users
            .mark_email_verified(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("user not found".to_string()))?;

        info!(target: "auth.verify_email", user_id = %user.id, "Email verified");
        self.publish(routing::USER_UPDATED, &UserEvent::from(&user))
            .await;

        Ok(UserResponse::from(&user))
    }
}

fn token_error_outcome(err: &crate::crypto::jwt::TokenError) -> &'static str {
    use crate::crypto::jwt::TokenError;
    match err {
        TokenError::InvalidSigningMethod => "invalid_signing_method",
        TokenError::InvalidSignature => "invalid_signature",
        TokenError::Expired => "expired",
        TokenError::MalformedClaims(_) => "malformed_claims",
    }
}
