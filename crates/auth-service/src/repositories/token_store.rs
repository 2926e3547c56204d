//! Ephemeral key-value store for token bindings and sessions.
//!
//! Every binding is keyed by the secret itself, so a single lookup is the
//! authorization decision: presence means valid, absence means revoked or
//! expired. A store failure is never treated as a miss.

use crate::errors::AuthError;
use crate::models::Session;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// Lifetime of a forgot-password OTP binding.
pub const OTP_TTL: Duration = Duration::from_secs(15 * 60);

/// Lifetime of a reset-password token binding.
pub const RESET_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Lifetime of a verify-email token binding.
pub const VERIFY_EMAIL_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The six binding namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenNamespace {
    Access,
    Refresh,
    Session,
    ForgotPasswordOtp,
    ResetPassword,
    VerifyEmail,
}

impl TokenNamespace {
    pub fn prefix(self) -> &'static str {
        match self {
            TokenNamespace::Access => "auth:token:access:",
            TokenNamespace::Refresh => "auth:token:refresh:",
            TokenNamespace::Session => "auth:session:",
            TokenNamespace::ForgotPasswordOtp => "auth:forgot_password_otp:",
            TokenNamespace::ResetPassword => "auth:reset_password:",
            TokenNamespace::VerifyEmail => "auth:verify_email:",
        }
    }

    pub fn key(self, token: &str) -> String {
        format!("{}{}", self.prefix(), token)
    }
}

/// Raw string store with per-key expiry.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Set `key`, replacing any prior value.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AuthError>;

    /// Set `key` only if it is absent. Returns whether the value was stored.
    async fn put_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, AuthError>;

    async fn get(&self, key: &str) -> Result<Option<String>, AuthError>;

    /// Atomically read and delete `key`.
    async fn take(&self, key: &str) -> Result<Option<String>, AuthError>;

    /// Delete `key`. Deleting an absent key is a no-op.
    async fn revoke(&self, key: &str) -> Result<(), AuthError>;
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Redis-backed store.
#[derive(Clone)]
pub struct RedisTokenStore {
    conn: ConnectionManager,
}

impl RedisTokenStore {
    pub async fn connect(url: &str) -> Result<Self, AuthError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Round-trip a PING, used by startup and health checks.
    pub async fn ping(&self) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AuthError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn take(&self, key: &str) -> Result<Option<String>, AuthError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn revoke(&self, key: &str) -> Result<(), AuthError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<i64>(&mut conn)
            .await?;
        Ok(())
    }
}

/// Typed view over a [`TokenStore`]: token → user id bindings and session
/// records.
#[derive(Clone)]
pub struct Bindings {
    store: Arc<dyn TokenStore>,
}

fn parse_user_id(value: Option<String>) -> Result<Option<Uuid>, AuthError> {
    value
        .map(|v| {
            Uuid::parse_str(&v)
                .map_err(|e| AuthError::TokenStore(format!("Corrupt binding value: {}", e)))
        })
        .transpose()
}

impl Bindings {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    #[instrument(skip_all, fields(namespace = ?namespace))]
    pub async fn bind(
        &self,
        namespace: TokenNamespace,
        token: &str,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        self.store
            .put(&namespace.key(token), &user_id.to_string(), ttl)
            .await
    }

    #[instrument(skip_all, fields(namespace = ?namespace))]
    pub async fn bind_if_absent(
        &self,
        namespace: TokenNamespace,
        token: &str,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<bool, AuthError> {
        self.store
            .put_if_absent(&namespace.key(token), &user_id.to_string(), ttl)
            .await
    }

    pub async fn user_for(
        &self,
        namespace: TokenNamespace,
        token: &str,
    ) -> Result<Option<Uuid>, AuthError> {
        parse_user_id(self.store.get(&namespace.key(token)).await?)
    }

    /// Single-use lookup: the binding is gone once this returns.
    pub async fn consume(
        &self,
        namespace: TokenNamespace,
        token: &str,
    ) -> Result<Option<Uuid>, AuthError> {
        parse_user_id(self.store.take(&namespace.key(token)).await?)
    }

    pub async fn revoke(&self, namespace: TokenNamespace, token: &str) -> Result<(), AuthError> {
        self.store.revoke(&namespace.key(token)).await
    }

    pub async fn put_session(&self, session: &Session, ttl: Duration) -> Result<(), AuthError> {
        let json = serde_json::to_string(session)
            .map_err(|e| AuthError::TokenStore(format!("Session encoding failed: {}", e)))?;
        self.store
            .put(&TokenNamespace::Session.key(&session.session_id), &json, ttl)
            .await
    }

    pub async fn session(&self, session_id: &str) -> Result<Option<Session>, AuthError> {
        self.store
            .get(&TokenNamespace::Session.key(session_id))
            .await?
            .map(|json| {
                serde_json::from_str(&json)
                    .map_err(|e| AuthError::TokenStore(format!("Corrupt session record: {}", e)))
            })
            .transpose()
    }

    pub async fn revoke_session(&self, session_id: &str) -> Result<(), AuthError> {
        self.revoke(TokenNamespace::Session, session_id).await
    }
}

/// In-process store with expiry on `tokio::time::Instant`, so paused-clock
/// tests can drive TTLs.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    pub struct InMemoryTokenStore {
        entries: Mutex<HashMap<String, (String, Instant)>>,
        unavailable: AtomicBool,
    }

    impl InMemoryTokenStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every operation fail as if the store were unreachable.
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        /// Live keys starting with `prefix`.
        pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
            let now = Instant::now();
            self.entries
                .lock()
                .await
                .iter()
                .filter(|(k, (_, expires))| k.starts_with(prefix) && *expires > now)
                .map(|(k, _)| k.clone())
                .collect()
        }

        /// Remaining lifetime of a live key.
        pub async fn ttl(&self, key: &str) -> Option<Duration> {
            let now = Instant::now();
            self.entries
                .lock()
                .await
                .get(key)
                .filter(|(_, expires)| *expires > now)
                .map(|(_, expires)| *expires - now)
        }

        fn check_available(&self) -> Result<(), AuthError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(AuthError::TokenStore("token store unavailable".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TokenStore for InMemoryTokenStore {
        async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AuthError> {
            self.check_available()?;
            self.entries
                .lock()
                .await
                .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
            Ok(())
        }

        async fn put_if_absent(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> Result<bool, AuthError> {
            self.check_available()?;
            let now = Instant::now();
            let mut entries = self.entries.lock().await;
            if entries.get(key).is_some_and(|(_, expires)| *expires > now) {
                return Ok(false);
            }
            entries.insert(key.to_string(), (value.to_string(), now + ttl));
            Ok(true)
        }

        async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
            self.check_available()?;
            let now = Instant::now();
            Ok(self
                .entries
                .lock()
                .await
                .get(key)
                .filter(|(_, expires)| *expires > now)
                .map(|(value, _)| value.clone()))
        }

        async fn take(&self, key: &str) -> Result<Option<String>, AuthError> {
            self.check_available()?;
            let now = Instant::now();
            Ok(self
                .entries
                .lock()
                .await
                .remove(key)
                .filter(|(_, expires)| *expires > now)
                .map(|(value, _)| value))
        }

        async fn revoke(&self, key: &str) -> Result<(), AuthError> {
            self.check_available()?;
            self.entries.lock().await.remove(key);
            Ok(())
        }
    }
}
