//! RabbitMQ transport.
//!
//! One connection per process. Publishes go through a single confirm-mode
//! channel; each consumer gets its own channel with a bounded prefetch.
//! When the connection drops, the next publish or consume re-dials.

use super::{Acknowledge, BusError, Delivery, DeliveryStream, EventPublisher, EventSource};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    publisher_confirm::Confirmation,
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT: u8 = 2;

/// Unacknowledged deliveries a single consumer may hold.
const CONSUMER_PREFETCH: u16 = 16;

struct Link {
    connection: Arc<Connection>,
    publish_channel: Channel,
}

/// Event bus backed by a durable RabbitMQ topic exchange.
pub struct AmqpBus {
    url: String,
    exchange: String,
    service: String,
    link: Mutex<Option<Link>>,
}

impl AmqpBus {
    /// Dial the broker and declare the exchange.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Connection`] when the broker is unreachable or the
    /// exchange cannot be declared. Services treat this as fatal at startup.
    pub async fn connect(url: &str, exchange: &str, service: &str) -> Result<Self, BusError> {
        let bus = Self {
            url: url.to_string(),
            exchange: exchange.to_string(),
            service: service.to_string(),
            link: Mutex::new(None),
        };
        bus.link().await?;
        Ok(bus)
    }

    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Current connection, re-dialing if the previous one was lost.
    async fn link(&self) -> Result<(Arc<Connection>, Channel), BusError> {
        let mut guard = self.link.lock().await;
        if let Some(link) = guard.as_ref() {
            if link.connection.status().connected() && link.publish_channel.status().connected() {
                return Ok((Arc::clone(&link.connection), link.publish_channel.clone()));
            }
            warn!(target: "common.events.amqp", "AMQP connection lost, reconnecting");
        }

        let properties =
            ConnectionProperties::default().with_connection_name(self.service.clone().into());
        let connection = Connection::connect(&self.url, properties)
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        let publish_channel = connection
            .create_channel()
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        publish_channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| BusError::Connection(e.to_string()))?;
        publish_channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Connection(format!("exchange declare failed: {e}")))?;

        info!(
            target: "common.events.amqp",
            exchange = %self.exchange,
            "Connected to event bus"
        );

        let connection = Arc::new(connection);
        *guard = Some(Link {
            connection: Arc::clone(&connection),
            publish_channel: publish_channel.clone(),
        });
        Ok((connection, publish_channel))
    }

    /// Close the connection. Unsettled deliveries are requeued by the broker.
    pub async fn close(&self) {
        if let Some(link) = self.link.lock().await.take() {
            if let Err(e) = link.connection.close(200, "shutdown").await {
                warn!(target: "common.events.amqp", error = %e, "Error closing AMQP connection");
            }
        }
    }
}

#[async_trait]
impl EventPublisher for AmqpBus {
    #[instrument(skip_all, name = "bus.publish", fields(routing_key = %routing_key))]
    async fn publish_raw(&self, routing_key: &str, body: Vec<u8>) -> Result<(), BusError> {
        let (_, channel) = self.link().await?;

        let timestamp = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(PERSISTENT)
            .with_timestamp(timestamp);

        let confirm = channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?;

        match confirm {
            Confirmation::Nack(_) => Err(BusError::Publish(format!(
                "broker rejected message for '{routing_key}'"
            ))),
            Confirmation::Ack(_) | Confirmation::NotRequested => Ok(()),
        }
    }
}

#[async_trait]
impl EventSource for AmqpBus {
    #[instrument(skip_all, name = "bus.consume", fields(queue = %queue))]
    async fn consume(
        &self,
        queue: &str,
        routing_keys: &[String],
    ) -> Result<DeliveryStream, BusError> {
        let (connection, _) = self.link().await?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BusError::Consume(e.to_string()))?;

        channel
            .basic_qos(CONSUMER_PREFETCH, BasicQosOptions::default())
            .await
            .map_err(|e| BusError::Consume(e.to_string()))?;

        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Consume(format!("queue declare failed: {e}")))?;

        for key in routing_keys {
            channel
                .queue_bind(
                    queue,
                    &self.exchange,
                    key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| BusError::Consume(format!("bind '{key}' failed: {e}")))?;
        }

        let consumer_tag = format!("{}-{}", self.service, queue);
        let consumer = channel
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Consume(e.to_string()))?;

        info!(
            target: "common.events.amqp",
            queue = %queue,
            bindings = routing_keys.len(),
            "Consuming from queue"
        );

        let stream = consumer.map(move |item| {
            // The consumer channel lives as long as the stream.
            let _ = &channel;
            item.map(|delivery| {
                Delivery::new(
                    delivery.routing_key.to_string(),
                    delivery.data,
                    delivery.redelivered,
                    Box::new(AmqpAcker(delivery.acker)),
                )
            })
            .map_err(|e| BusError::Consume(e.to_string()))
        });

        Ok(Box::pin(stream))
    }
}

struct AmqpAcker(lapin::acker::Acker);

#[async_trait]
impl Acknowledge for AmqpAcker {
    async fn ack(&self) -> Result<(), BusError> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map_err(|e| BusError::Ack(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<(), BusError> {
        self.0
            .nack(BasicNackOptions {
                requeue,
                ..BasicNackOptions::default()
            })
            .await
            .map_err(|e| BusError::Ack(e.to_string()))
    }
}
