//! Process lifecycle: signal handling and graceful HTTP shutdown.
//!
//! Every service owns one root [`CancellationToken`]. A SIGINT or SIGTERM
//! cancels it; the HTTP server stops accepting connections and drains
//! in-flight requests up to a deadline, and consumer loops observe the same
//! token and stop pulling deliveries.

use axum::Router;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Resolve when SIGINT or SIGTERM is received.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => {
                error!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Cancel `token` once a shutdown signal arrives.
pub fn cancel_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = wait_for_signal() => token.cancel(),
            () = token.cancelled() => {}
        }
    })
}

/// Serve `app` until `shutdown` is cancelled, then drain in-flight requests
/// for at most `drain_timeout`.
///
/// # Errors
///
/// Returns the server's I/O error if it fails before shutdown.
pub async fn serve_with_shutdown(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    drain_timeout: Duration,
) -> std::io::Result<()> {
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.clone().cancelled_owned())
    .into_future();
    let mut server = std::pin::pin!(server);

    let deadline = async {
        shutdown.cancelled().await;
        tokio::time::sleep(drain_timeout).await;
    };

    tokio::select! {
        result = &mut server => {
            info!("HTTP server stopped");
            result
        }
        () = deadline => {
            warn!(
                drain_secs = drain_timeout.as_secs(),
                "Drain deadline elapsed with requests still in flight"
            );
            Ok(())
        }
    }
}
