//! Test server harness for E2E testing
//!
//! Provides `TestAuthServer` for spawning the real auth router in tests,
//! backed by in-memory stores and the in-memory event bus.

use crate::fixtures::test_settings;
use auth_service::config::AuthSettings;
use auth_service::crypto;
use auth_service::models::{NewUser, Role, User, UserStatus};
use auth_service::repositories::token_store::memory::InMemoryTokenStore;
use auth_service::repositories::users::memory::InMemoryUserRepository;
use auth_service::repositories::{TokenNamespace, UserRepository};
use auth_service::routes::{self, AppState};
use auth_service::services::{AuthService, UserAdminService};
use common::events::InMemoryBus;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the auth service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_register_e2e() -> Result<()> {
///     let server = TestAuthServer::spawn().await?;
///     let client = reqwest::Client::new();
///
///     let response = client
///         .post(server.endpoint("/api/v1/auth/register"))
///         .json(&register_body("a@b.c", "alice", TEST_PASSWORD))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 201);
///     Ok(())
/// }
/// ```
pub struct TestAuthServer {
    addr: SocketAddr,
    users: Arc<InMemoryUserRepository>,
    store: Arc<InMemoryTokenStore>,
    bus: InMemoryBus,
    settings: AuthSettings,
    _handle: JoinHandle<()>,
}

impl TestAuthServer {
    /// Spawn a server with the default test settings.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(test_settings()).await
    }

    /// Spawn a server with custom settings.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use fresh in-memory user, token, and bus instances
    /// - Start the HTTP server in the background
    pub async fn spawn_with(settings: AuthSettings) -> Result<Self, anyhow::Error> {
        let users = Arc::new(InMemoryUserRepository::new());
        let store = Arc::new(InMemoryTokenStore::new());
        let bus = InMemoryBus::new();

        let auth = AuthService::new(
            users.clone(),
            store.clone(),
            Arc::new(bus.clone()),
            &settings,
        );
        let admin = UserAdminService::new(users.clone(), Arc::new(bus.clone()), settings.bcrypt_cost);
        let state = Arc::new(AppState {
            auth: Arc::new(auth),
            users: Arc::new(admin),
        });

        // No /metrics route: the global recorder can only be installed once
        // per test process.
        let app = routes::build_routes(state, None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            // Use into_make_service_with_connect_info to support SocketAddr extraction
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            users,
            store,
            bus,
            settings,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Absolute URL for a path on the test server.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url(), path)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn users(&self) -> &Arc<InMemoryUserRepository> {
        &self.users
    }

    pub fn store(&self) -> &Arc<InMemoryTokenStore> {
        &self.store
    }

    pub fn bus(&self) -> &InMemoryBus {
        &self.bus
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    /// Insert a user directly into the identity store.
    pub async fn seed_user(
        &self,
        email: &str,
        username: &str,
        password: &str,
        role: Role,
        email_verified: bool,
    ) -> Result<User, anyhow::Error> {
        let password_hash = crypto::hash_password(password, self.settings.bcrypt_cost)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
        self.users
            .insert(NewUser {
                email: email.to_string(),
                username: username.to_string(),
                password_hash,
                role,
                status: UserStatus::Active,
                email_verified,
            })
            .await
            .map_err(|e| anyhow::anyhow!("Failed to seed user: {}", e))
    }

    /// Insert an active student whose email is already verified.
    pub async fn seed_verified_user(
        &self,
        email: &str,
        username: &str,
        password: &str,
    ) -> Result<User, anyhow::Error> {
        self.seed_user(email, username, password, Role::Student, true)
            .await
    }

    /// Live token strings bound in `namespace`.
    pub async fn tokens_in(&self, namespace: TokenNamespace) -> Vec<String> {
        let prefix = namespace.prefix();
        self.store
            .keys_with_prefix(prefix)
            .await
            .into_iter()
            .filter_map(|key| key.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    /// The single live token in `namespace`, if exactly one exists.
    pub async fn only_token_in(&self, namespace: TokenNamespace) -> Option<String> {
        let mut tokens = self.tokens_in(namespace).await;
        if tokens.len() == 1 {
            tokens.pop()
        } else {
            None
        }
    }
}

impl Drop for TestAuthServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
