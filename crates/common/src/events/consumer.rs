//! Consumer loop shared by every projection service.
//!
//! The loop awaits the next delivery and the shutdown token concurrently,
//! hands each delivery to an [`EventHandler`], and settles it:
//!
//! | Handler result | Settlement |
//! |---|---|
//! | `Ok(Applied)` | ack |
//! | `Ok(Ignored)` (unknown routing key) | ack, warn |
//! | `Ok(Malformed)` (undecodable body) | ack, warn |
//! | `Err(RetryableError)` | back off, then nack with requeue |
//!
//! The back-off keeps a poison message from spinning the queue: it starts at
//! 100 ms, doubles per consecutive failure up to 30 s, and resets after the
//! next successful delivery.

use super::{BusError, Delivery, EventSource};
use crate::observability::record_event_consumed;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// What the handler did with a delivery it accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Applied,
    Ignored,
    Malformed(String),
}

/// Failure that should be retried by redelivery.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RetryableError(pub String);

/// Per-service dispatcher from routing key to projection update.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, routing_key: &str, body: &[u8]) -> Result<HandleOutcome, RetryableError>;
}

/// Exponential back-off with a ceiling.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    initial: Duration,
    max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_BACKOFF, MAX_BACKOFF)
    }
}

impl Backoff {
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial,
            initial,
            max,
        }
    }

    /// Delay to wait now; doubles the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Consume `queue` until `shutdown` is cancelled or the stream ends.
///
/// # Errors
///
/// Returns the bus error when the subscription cannot be established or the
/// stream closes (connection loss). Returns `Ok(())` on shutdown.
pub async fn run_consumer(
    source: Arc<dyn EventSource>,
    queue: &str,
    routing_keys: &[String],
    handler: Arc<dyn EventHandler>,
    shutdown: CancellationToken,
) -> Result<(), BusError> {
    let mut stream = source.consume(queue, routing_keys).await?;
    let mut backoff = Backoff::default();

    loop {
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                info!(target: "common.events.consumer", queue, "Consumer stopping on shutdown");
                return Ok(());
            }
            next = stream.next() => next,
        };

        let delivery = match next {
            Some(Ok(delivery)) => delivery,
            Some(Err(e)) => return Err(e),
            None => {
                warn!(target: "common.events.consumer", queue, "Delivery stream closed");
                return Err(BusError::Consume(format!("stream for '{queue}' closed")));
            }
        };

        process_delivery(queue, handler.as_ref(), delivery, &mut backoff, &shutdown).await;
    }
}

/// [`run_consumer`] wrapped in a reconnect loop with back-off. Returns
/// once `shutdown` is cancelled.
pub async fn run_consumer_with_reconnect(
    source: Arc<dyn EventSource>,
    queue: String,
    routing_keys: Vec<String>,
    handler: Arc<dyn EventHandler>,
    shutdown: CancellationToken,
) {
    let mut backoff = Backoff::new(Duration::from_secs(1), MAX_BACKOFF);

    while !shutdown.is_cancelled() {
        let started = Instant::now();
        match run_consumer(
            Arc::clone(&source),
            &queue,
            &routing_keys,
            Arc::clone(&handler),
            shutdown.clone(),
        )
        .await
        {
            Ok(()) => break,
            Err(e) => {
                if started.elapsed() > MAX_BACKOFF {
                    backoff.reset();
                }
                let delay = backoff.next_delay();
                error!(
                    target: "common.events.consumer",
                    queue = %queue,
                    error = %e,
                    retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Consumer failed, reconnecting"
                );
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    info!(target: "common.events.consumer", queue = %queue, "Consumer stopped");
}

async fn process_delivery(
    queue: &str,
    handler: &dyn EventHandler,
    delivery: Delivery,
    backoff: &mut Backoff,
    shutdown: &CancellationToken,
) {
    let start = Instant::now();
    let routing_key = delivery.routing_key.clone();

    match handler.handle(&routing_key, &delivery.body).await {
        Ok(outcome) => {
            backoff.reset();
            let label = match &outcome {
                HandleOutcome::Applied => {
                    debug!(target: "common.events.consumer", queue, routing_key = %routing_key, "Event applied");
                    "applied"
                }
                HandleOutcome::Ignored => {
                    warn!(target: "common.events.consumer", queue, routing_key = %routing_key, "Unhandled routing key, acking");
                    "ignored"
                }
                HandleOutcome::Malformed(reason) => {
                    warn!(target: "common.events.consumer", queue, routing_key = %routing_key, reason = %reason, "Malformed event body, acking");
                    "malformed"
                }
            };
            if let Err(e) = delivery.ack().await {
                error!(target: "common.events.consumer", queue, error = %e, "Failed to ack delivery");
            }
            record_event_consumed(queue, label, start.elapsed());
        }
        Err(e) => {
            let delay = backoff.next_delay();
            warn!(
                target: "common.events.consumer",
                queue,
                routing_key = %routing_key,
                error = %e,
                retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Event handling failed, requeueing"
            );
            tokio::select! {
                () = shutdown.cancelled() => {}
                () = tokio::time::sleep(delay) => {}
            }
            if let Err(e) = delivery.nack(true).await {
                error!(target: "common.events.consumer", queue, error = %e, "Failed to nack delivery");
            }
            record_event_consumed(queue, "requeued", start.elapsed());
        }
    }
}
