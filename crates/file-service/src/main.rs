//! File service
//!
//! Stores course files in an S3-compatible object store and indexes them
//! in Postgres.

use common::observability::{init_metrics_recorder, init_tracing};
use common::secret::ExposeSecret;
use common::shutdown::{cancel_on_signal, serve_with_shutdown};
use file_service::config::Config;
use file_service::repositories::PgFileRepository;
use file_service::routes::{self, AppState};
use file_service::services::{FileService, S3ObjectStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SERVICE_NAME: &str = "file-service";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("file_service=debug,common=info,tower_http=debug");

    info!("Starting file service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.server.bind_address,
        storage_endpoint = %config.storage.endpoint,
        max_upload_bytes = config.uploads.max_upload_bytes,
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

    let service = FileService::new(
        Arc::new(PgFileRepository::new(pool.clone())),
        Arc::new(S3ObjectStore::new(&config.storage)),
        config.uploads,
    );

    service.ensure_buckets().await.map_err(|e| {
        error!("Failed to prepare object store buckets: {}", e);
        e
    })?;

    let state = Arc::new(AppState {
        files: Arc::new(service),
    });
    let app = routes::build_routes(state, Some(metrics_handle));

    let shutdown = CancellationToken::new();
    let signal_task = cancel_on_signal(shutdown.clone());

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    info!("File service listening on {}", config.server.bind_address);

    serve_with_shutdown(listener, app, shutdown.clone(), config.server.drain_timeout).await?;

    shutdown.cancel();
    signal_task.abort();
    pool.close().await;

    info!("File service shutdown complete");

    Ok(())
}
