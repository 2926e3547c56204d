//! Admin user management.
//!
//! The auth service owns every mutation of the identity store, so the
//! `user.user.*` events that downstream projections consume originate here.

use crate::crypto;
use crate::errors::AuthError;
use crate::models::events::{UserDeletedEvent, UserEvent};
use crate::models::{
    CreateUserRequest, NewUser, Role, UpdateUserRequest, User, UserChanges, UserResponse,
    UserStatus,
};
use crate::repositories::UserRepository;
use crate::services::validation::{normalize_email, validate_password, validate_username};
use chrono::Utc;
use common::events::{routing, EventPublisher};
use common::secret::ExposeSecret;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct UserAdminService {
    users: Arc<dyn UserRepository>,
    publisher: Arc<dyn EventPublisher>,
    bcrypt_cost: u32,
}

fn ensure_not_banned_admin(role: Role, status: UserStatus) -> Result<(), AuthError> {
    if role == Role::Admin && status == UserStatus::Banned {
        return Err(AuthError::Forbidden("an admin cannot be banned".to_string()));
    }
    Ok(())
}

impl UserAdminService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        publisher: Arc<dyn EventPublisher>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            users,
            publisher,
            bcrypt_cost,
        }
    }

    async fn publish<T: Serialize + Sync>(&self, routing_key: &str, payload: &T) {
        if let Err(e) = self.publisher.publish(routing_key, payload).await {
            warn!(target: "auth.users", routing_key = %routing_key, error = %e, "Event publish failed; state change kept");
        }
    }

    async fn load(&self, id: Uuid) -> Result<User, AuthError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AuthError::NotFound("user not found".to_string()))
    }

    #[instrument(skip_all, name = "users.create")]
    pub async fn create(&self, request: CreateUserRequest) -> Result<UserResponse, AuthError> {
        let email = normalize_email(&request.email)?;
        let username = validate_username(&request.username)?;
        validate_password(request.password.expose_secret())?;

        let role = request.role.unwrap_or(Role::Student);
        let status = request.status.unwrap_or(UserStatus::Active);
        ensure_not_banned_admin(role, status)?;

        if self.users.email_exists(&email).await? {
            return Err(AuthError::Conflict("email already exists".to_string()));
        }
        if self.users.username_exists(&username).await? {
            return Err(AuthError::Conflict("username already exists".to_string()));
        }

        let password_hash =
            crypto::hash_password(request.password.expose_secret(), self.bcrypt_cost)?;
        let user = self
            .users
            .insert(NewUser {
                email,
                username,
                password_hash,
                role,
                status,
                email_verified: request.email_verified.unwrap_or(false),
            })
            .await?;

        info!(target: "auth.users", user_id = %user.id, role = %user.role, "User created");
        self.publish(routing::USER_CREATED, &UserEvent::from(&user))
            .await;

        Ok(UserResponse::from(&user))
    }

    #[instrument(skip_all, name = "users.get", fields(user_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<UserResponse, AuthError> {
        Ok(UserResponse::from(&self.load(id).await?))
    }

    /// Partial update. Status changes follow
    /// [`UserStatus::can_transition_to`]; leaving `banned` requires
    /// [`Self::unban`].
    #[instrument(skip_all, name = "users.update", fields(user_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateUserRequest,
    ) -> Result<UserResponse, AuthError> {
        let current = self.load(id).await?;

        let email = request
            .email
            .as_deref()
            .map(normalize_email)
            .transpose()?
            .filter(|e| *e != current.email);
        let username = request
            .username
            .as_deref()
            .map(validate_username)
            .transpose()?
            .filter(|u| *u != current.username);

        if let Some(status) = request.status {
            if !current.status.can_transition_to(status) {
                let hint = if current.status == UserStatus::Banned {
                    "; use the unban endpoint"
                } else {
                    ""
                };
                return Err(AuthError::Validation(format!(
                    "cannot change status from {} to {}{}",
                    current.status, status, hint
                )));
            }
        }
        ensure_not_banned_admin(
            request.role.unwrap_or(current.role),
            request.status.unwrap_or(current.status),
        )?;

        if let Some(email) = email.as_deref() {
            if self.users.email_exists(email).await? {
                return Err(AuthError::Conflict("email already exists".to_string()));
            }
        }
        if let Some(username) = username.as_deref() {
            if self.users.username_exists(username).await? {
                return Err(AuthError::Conflict("username already exists".to_string()));
            }
        }

        let user = self
            .users
            .update(
                id,
                UserChanges {
                    email,
                    username,
                    role: request.role,
                    status: request.status,
                },
            )
            .await?
            .ok_or_else(|| AuthError::NotFound("user not found".to_string()))?;

        info!(target: "auth.users", user_id = %user.id, "User updated");
        self.publish(routing::USER_UPDATED, &UserEvent::from(&user))
            .await;

        Ok(UserResponse::from(&user))
    }

    /// The only path out of `banned`.
    #[instrument(skip_all, name = "users.unban", fields(user_id = %id))]
    pub async fn unban(&self, id: Uuid) -> Result<UserResponse, AuthError> {
        let current = self.load(id).await?;
        if current.status != UserStatus::Banned {
            return Err(AuthError::Conflict("user is not banned".to_string()));
        }

        let user = self
            .users
            .update(
                id,
                UserChanges {
                    status: Some(UserStatus::Active),
                    ..Default::default()
                },
            )
            .await?
            .ok_or_else(|| AuthError::NotFound("user not found".to_string()))?;

        info!(target: "auth.users", user_id = %user.id, "User unbanned");
        self.publish(routing::USER_UPDATED, &UserEvent::from(&user))
            .await;

        Ok(UserResponse::from(&user))
    }

    #[instrument(skip_all, name = "users.delete", fields(user_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), AuthError> {
        let current = self.load(id).await?;
        if current.role == Role::Admin {
            return Err(AuthError::Forbidden("cannot delete an admin".to_string()));
        }

        if !self.users.delete(id).await? {
            return Err(AuthError::NotFound("user not found".to_string()));
        }

        info!(target: "auth.users", user_id = %id, "User deleted");
        let event = UserDeletedEvent {
            id,
            deleted_at: Utc::now(),
        };
        self.publish(routing::USER_DELETED, &event).await;

        Ok(())
    }
}
