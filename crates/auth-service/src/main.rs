//! Auth service
//!
//! Owns the identity store and the session/token lifecycle for the LMS.

use auth_service::config::Config;
use auth_service::repositories::{PgUserRepository, RedisTokenStore, UserRepository};
use auth_service::routes::{self, AppState};
use auth_service::services::{AuthService, UserAdminService};
use common::events::AmqpBus;
use common::observability::{init_metrics_recorder, init_tracing};
use common::secret::ExposeSecret;
use common::shutdown::{cancel_on_signal, serve_with_shutdown};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SERVICE_NAME: &str = "auth-service";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("auth_service=debug,common=info,tower_http=debug");

    info!("Starting auth service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.server.bind_address,
        access_token_ttl_secs = config.auth.access_token_ttl.as_secs(),
        refresh_token_ttl_secs = config.auth.refresh_token_ttl.as_secs(),
        bcrypt_cost = config.auth.bcrypt_cost,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder(SERVICE_NAME).map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(config.database.url.expose_secret())
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        error!("Failed to run migrations: {}", e);
        e
    })?;
    info!("Database connection established");

    let token_store = RedisTokenStore::connect(config.redis.url.expose_secret())
        .await
        .map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            e
        })?;
    token_store.ping().await?;
    info!("Token store connection established");

    let bus = Arc::new(
        AmqpBus::connect(config.bus.url(), &config.bus.exchange, SERVICE_NAME)
            .await
            .map_err(|e| {
                error!("Failed to connect to event bus: {}", e);
                e
            })?,
    );
    info!(exchange = %bus.exchange(), "Event bus connection established");

    let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));
    let auth = AuthService::new(
        users.clone(),
        Arc::new(token_store),
        bus.clone(),
        &config.auth,
    );
    let admin = UserAdminService::new(users, bus.clone(), config.auth.bcrypt_cost);

    let state = Arc::new(AppState {
        auth: Arc::new(auth),
        users: Arc::new(admin),
    });
    let app = routes::build_routes(state, Some(metrics_handle));

    let shutdown = CancellationToken::new();
    let signal_task = cancel_on_signal(shutdown.clone());

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    info!("Auth service listening on {}", config.server.bind_address);

    serve_with_shutdown(listener, app, shutdown.clone(), config.server.drain_timeout).await?;

    shutdown.cancel();
    signal_task.abort();
    bus.close().await;
    pool.close().await;

    info!("Auth service shutdown complete");

    Ok(())
}
