//! User repository.
//!
//! The `users` table is the identity store. Email uniqueness is enforced
//! case-insensitively by a unique index on `LOWER(email)`; a CHECK constraint
//! keeps admins from being banned even if two updates race.

use crate::errors::AuthError;
use crate::models::{NewUser, User, UserChanges};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Lookup by an already-normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError>;

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError>;

    /// Insert a user. A unique-index race yields [`AuthError::Conflict`].
    async fn insert(&self, user: NewUser) -> Result<User, AuthError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AuthError>;

    /// Set `email_verified` and stamp `email_verified_at` if not already set.
    async fn mark_email_verified(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Apply a partial update. Returns `None` when the user does not exist.
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AuthError>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, AuthError>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    password_hash: String,
    role: String,
    status: String,
    email_verified: bool,
    email_verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AuthError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            role: row.role.parse().map_err(AuthError::Database)?,
            status: row.status.parse().map_err(AuthError::Database)?,
            email_verified: row.email_verified,
            email_verified_at: row.email_verified_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const USER_COLUMNS: &str = "id, email, username, password_hash, role, status, \
     email_verified, email_verified_at, created_at, updated_at";

/// Postgres-backed identity store.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn into_user(row: Option<UserRow>) -> Result<Option<User>, AuthError> {
    row.map(User::try_from).transpose()
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        into_user(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        into_user(row)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert(&self, user: NewUser) -> Result<User, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, email, username, password_hash, role, status,
                               email_verified, email_verified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, CASE WHEN $7 THEN NOW() END)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.email_verified)
        .fetch_one(&self.pool)
        .await?;

        User::try_from(row)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AuthError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("user not found".to_string()));
        }
        Ok(())
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET email_verified = TRUE,
                email_verified_at = COALESCE(email_verified_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        into_user(row)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AuthError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                username = COALESCE($3, username),
                role = COALESCE($4, role),
                status = COALESCE($5, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.email)
        .bind(changes.username)
        .bind(changes.role.map(|r| r.as_str()))
        .bind(changes.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        into_user(row)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-memory identity store with the same uniqueness and role rules as the
/// database schema.
pub mod memory {
    use super::*;
    use crate::models::{Role, UserStatus};
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryUserRepository {
        users: Mutex<HashMap<Uuid, User>>,
    }

    impl InMemoryUserRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// All stored users, unordered.
        pub async fn all(&self) -> Vec<User> {
            self.users.lock().await.values().cloned().collect()
        }
    }

    fn check_unique(
        users: &HashMap<Uuid, User>,
        id: Uuid,
        email: &str,
        username: &str,
    ) -> Result<(), AuthError> {
        for other in users.values().filter(|u| u.id != id) {
            if other.email.eq_ignore_ascii_case(email) {
                return Err(AuthError::Conflict("email already exists".to_string()));
            }
            if other.username == username {
                return Err(AuthError::Conflict("username already exists".to_string()));
            }
        }
        Ok(())
    }

    fn check_role_status(role: Role, status: UserStatus) -> Result<(), AuthError> {
        if role == Role::Admin && status == UserStatus::Banned {
            return Err(AuthError::Forbidden("cannot ban an admin".to_string()));
        }
        Ok(())
    }

    #[async_trait]
    impl UserRepository for InMemoryUserRepository {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
            Ok(self.users.lock().await.get(&id).cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
            Ok(self
                .users
                .lock()
                .await
                .values()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .cloned())
        }

        async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
            Ok(self.find_by_email(email).await?.is_some())
        }

        async fn username_exists(&self, username: &str) -> Result<bool, AuthError> {
            Ok(self
                .users
                .lock()
                .await
                .values()
                .any(|u| u.username == username))
        }

        async fn insert(&self, new: NewUser) -> Result<User, AuthError> {
            let mut users = self.users.lock().await;
            let id = Uuid::new_v4();
            check_unique(&users, id, &new.email, &new.username)?;
            check_role_status(new.role, new.status)?;

            let now = Utc::now();
            let user = User {
                id,
                email: new.email,
                username: new.username,
                password_hash: new.password_hash,
                role: new.role,
                status: new.status,
                email_verified: new.email_verified,
                email_verified_at: new.email_verified.then_some(now),
                created_at: now,
                updated_at: now,
            };
            users.insert(id, user.clone());
            Ok(user)
        }

        async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AuthError> {
            let mut users = self.users.lock().await;
            let user = users
                .get_mut(&id)
                .ok_or_else(|| AuthError::NotFound("user not found".to_string()))?;
            user.password_hash = password_hash.to_string();
            user.updated_at = Utc::now();
            Ok(())
        }

        async fn mark_email_verified(&self, id: Uuid) -> Result<Option<User>, AuthError> {
            let mut users = self.users.lock().await;
            let Some(user) = users.get_mut(&id) else {
                return Ok(None);
            };
            let now = Utc::now();
            user.email_verified = true;
            user.email_verified_at.get_or_insert(now);
            user.updated_at = now;
            Ok(Some(user.clone()))
        }

        async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AuthError> {
            let mut users = self.users.lock().await;
            let Some(current) = users.get(&id).cloned() else {
                return Ok(None);
            };

            let mut next = current;
            if let Some(email) = changes.email {
                next.email = email;
            }
            if let Some(username) = changes.username {
                next.username = username;
            }
            if let Some(role) = changes.role {
                next.role = role;
            }
            if let Some(status) = changes.status {
                next.status = status;
            }
            check_unique(&users, id, &next.email, &next.username)?;
            check_role_status(next.role, next.status)?;
            next.updated_at = Utc::now();

            users.insert(id, next.clone());
            Ok(Some(next))
        }

        async fn delete(&self, id: Uuid) -> Result<bool, AuthError> {
            Ok(self.users.lock().await.remove(&id).is_some())
        }
    }
}
