//! Zoom service
//!
//! Meeting orchestrator: binds provider video meetings to section modules.

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
use zoom_service::config::Config;
use zoom_service::repositories::PgMeetingRepository;
use zoom_service::routes::{self, AppState};
use zoom_service::services::{MeetingService, ZoomClient};

const SERVICE_NAME: &str = "zoom-service";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("zoom_service=debug,common=info,tower_http=debug");

    info!("Starting zoom service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.server.bind_address,
        zoom_base_url = %config.zoom.base_url,
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

    let bus = Arc::new(
        AmqpBus::connect(config.bus.url(), &config.bus.exchange, SERVICE_NAME)
            .await
            .map_err(|e| {
                error!("Failed to connect to event bus: {}", e);
                e
            })?,
    );
    info!(exchange = %bus.exchange(), "Event bus connection established");

    let provider = ZoomClient::new(config.zoom.clone())?;
    let service = MeetingService::new(
        Arc::new(PgMeetingRepository::new(pool.clone())),
        Arc::new(provider),
        bus.clone(),
    );

    let state = Arc::new(AppState {
        meetings: Arc::new(service),
    });
    let app = routes::build_routes(state, Some(metrics_handle));

    let shutdown = CancellationToken::new();
    let signal_task = cancel_on_signal(shutdown.clone());

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    info!("Zoom service listening on {}", config.server.bind_address);

    serve_with_shutdown(listener, app, shutdown.clone(), config.server.drain_timeout).await?;

    shutdown.cancel();
    signal_task.abort();
    bus.close().await;
    pool.close().await;

    info!("Zoom service shutdown complete");

    Ok(())
}
