//! Enrollment service
//!
//! Projection consumer for enrollment display names.

use common::events::{run_consumer_with_reconnect, AmqpBus, EventHandler, EventSource};
use common::observability::{init_metrics_recorder, init_tracing};
use common::secret::ExposeSecret;
use common::shutdown::{cancel_on_signal, serve_with_shutdown};
use enrollment_service::config::Config;
use enrollment_service::repositories::PgEnrollmentProjectionStore;
use enrollment_service::routes;
use enrollment_service::services::{EnrollmentEventHandler, QUEUE, ROUTING_KEYS};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "enrollment-service";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("enrollment_service=debug,common=info,tower_http=debug");

    info!("Starting enrollment service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.server.bind_address,
        exchange = %config.bus.exchange,
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

    let shutdown = CancellationToken::new();
    let signal_task = cancel_on_signal(shutdown.clone());

    let handler: Arc<dyn EventHandler> = Arc::new(EnrollmentEventHandler::new(Arc::new(
        PgEnrollmentProjectionStore::new(pool.clone()),
    )));
    let source: Arc<dyn EventSource> = bus.clone();
    let consumer = tokio::spawn(run_consumer_with_reconnect(
        source,
        QUEUE.to_string(),
        ROUTING_KEYS.iter().map(|k| (*k).to_string()).collect(),
        handler,
        shutdown.clone(),
    ));
    info!(queue = QUEUE, "Event consumer started");

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    info!("Enrollment service listening on {}", config.server.bind_address);

    let app = routes::build_routes(Some(metrics_handle));
    serve_with_shutdown(listener, app, shutdown.clone(), config.server.drain_timeout).await?;

    shutdown.cancel();
    if tokio::time::timeout(config.server.drain_timeout, consumer)
        .await
        .is_err()
    {
        warn!("Consumer did not stop within the drain timeout");
    }
    signal_task.abort();
    bus.close().await;
    pool.close().await;

    info!("Enrollment service shutdown complete");

    Ok(())
}
