//! Event backbone.
//!
//! One durable topic exchange carries every state-change event between the
//! services. Producers publish JSON payloads under dot-segmented routing
//! keys (`<service>.<aggregate>.<verb>`); each consuming service owns one
//! durable queue bound to the keys it cares about and acknowledges each
//! delivery manually.
//!
//! Delivery is at-least-once. Consumers must be idempotent and must not
//! rely on ordering across routing keys.
//!
//! Two transports implement the [`EventPublisher`] / [`EventSource`] seams:
//! - [`AmqpBus`]: RabbitMQ via `lapin`, used in deployment.
//! - [`InMemoryBus`]: in-process topic exchange used by tests.

pub mod amqp;
pub mod consumer;
pub mod memory;
pub mod payload;
pub mod routing;

pub use amqp::AmqpBus;
pub use consumer::{
    run_consumer, run_consumer_with_reconnect, Backoff, EventHandler, HandleOutcome,
    RetryableError,
};
pub use memory::{InMemoryBus, PublishedEvent};
pub use payload::string_or_number;

use async_trait::async_trait;
use futures::Stream;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::pin::Pin;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Bus connection error: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Consume failed: {0}")]
    Consume(String),

    #[error("Event serialization failed: {0}")]
    Serialization(String),

    #[error("Acknowledgement failed: {0}")]
    Ack(String),
}

/// Publishing half of the bus.
///
/// Implementations stamp `content_type=application/json`, persistent
/// delivery, and the publish timestamp.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an already-serialized JSON body under `routing_key`.
    async fn publish_raw(&self, routing_key: &str, body: Vec<u8>) -> Result<(), BusError>;
}

impl dyn EventPublisher {
    /// Serialize `payload` as JSON and publish it.
    ///
    /// # Errors
    ///
    /// Fails on an invalid routing key, a serialization error, or a transport
    /// failure. Callers that already committed local state log and continue.
    pub async fn publish<T>(&self, routing_key: &str, payload: &T) -> Result<(), BusError>
    where
        T: Serialize + Sync + ?Sized,
    {
        if !routing::is_valid_routing_key(routing_key) {
            return Err(BusError::Publish(format!(
                "invalid routing key '{routing_key}'"
            )));
        }
        let body =
            serde_json::to_vec(payload).map_err(|e| BusError::Serialization(e.to_string()))?;

        let result = self.publish_raw(routing_key, body).await;
        crate::observability::record_event_published(routing_key, result.is_ok());
        result
    }
}

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), BusError>;
    async fn nack(&self, requeue: bool) -> Result<(), BusError>;
}

/// One message pulled from a queue.
pub struct Delivery {
    pub routing_key: String,
    pub body: Vec<u8>,
    pub redelivered: bool,
    acker: Box<dyn Acknowledge>,
}

impl Delivery {
    pub fn new(
        routing_key: impl Into<String>,
        body: Vec<u8>,
        redelivered: bool,
        acker: Box<dyn Acknowledge>,
    ) -> Self {
        Self {
            routing_key: routing_key.into(),
            body,
            redelivered,
            acker,
        }
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the decoder error for malformed bodies.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// # Errors
    ///
    /// Returns [`BusError::Ack`] when the broker rejects the acknowledgement.
    pub async fn ack(self) -> Result<(), BusError> {
        self.acker.ack().await
    }

    /// # Errors
    ///
    /// Returns [`BusError::Ack`] when the broker rejects the negative acknowledgement.
    pub async fn nack(self, requeue: bool) -> Result<(), BusError> {
        self.acker.nack(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("routing_key", &self.routing_key)
            .field("body_len", &self.body.len())
            .field("redelivered", &self.redelivered)
            .finish_non_exhaustive()
    }
}

pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, BusError>> + Send>>;

/// Consuming half of the bus.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Declare `queue` (durable, idempotent), bind each of `routing_keys`
    /// to the exchange, and stream its deliveries. The stream ends when the
    /// connection is lost; dropping it cancels the subscription.
    async fn consume(&self, queue: &str, routing_keys: &[String])
        -> Result<DeliveryStream, BusError>;
}
