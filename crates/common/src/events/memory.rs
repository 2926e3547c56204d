//! In-process topic exchange.
//!
//! Mirrors the broker semantics the services rely on: messages published
//! before a queue is bound are dropped, every bound queue receives its own
//! copy, `nack(requeue=true)` puts the message back at the head of the
//! queue, and a delivery dropped without being settled is requeued as if
//! the consumer's channel had closed.

use super::{
    routing, Acknowledge, BusError, Delivery, DeliveryStream, EventPublisher, EventSource,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Record of a message accepted by [`InMemoryBus::publish_raw`].
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub routing_key: String,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub persistent: bool,
    pub timestamp: DateTime<Utc>,
}

impl PublishedEvent {
    /// Body decoded as a JSON value (`Null` when malformed).
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Clone)]
struct QueuedMessage {
    routing_key: String,
    body: Vec<u8>,
    redelivered: bool,
}

#[derive(Default)]
struct QueueState {
    patterns: Vec<String>,
    messages: VecDeque<QueuedMessage>,
    unacked: usize,
    notify: Arc<Notify>,
}

#[derive(Default)]
struct Inner {
    queues: HashMap<String, QueueState>,
    published: Vec<PublishedEvent>,
    fail_publish: bool,
}

/// In-memory implementation of both bus seams.
#[derive(Clone, Default)]
pub struct InMemoryBus {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock_inner(&self.inner)
    }

    /// Declare a queue and bind patterns without starting a consumer.
    pub fn bind(&self, queue: &str, patterns: &[&str]) {
        let mut inner = self.lock();
        let state = inner.queues.entry(queue.to_string()).or_default();
        for pattern in patterns {
            if !state.patterns.iter().any(|p| p == pattern) {
                state.patterns.push((*pattern).to_string());
            }
        }
    }

    /// Make subsequent publishes fail with [`BusError::Publish`].
    pub fn set_publish_failure(&self, fail: bool) {
        self.lock().fail_publish = fail;
    }

    /// Every message published so far, in publish order.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedEvent> {
        self.lock().published.clone()
    }

    /// Messages published under exactly `routing_key`.
    #[must_use]
    pub fn published_with_key(&self, routing_key: &str) -> Vec<PublishedEvent> {
        self.lock()
            .published
            .iter()
            .filter(|e| e.routing_key == routing_key)
            .cloned()
            .collect()
    }

    /// Messages waiting in `queue` (not yet delivered).
    #[must_use]
    pub fn ready_count(&self, queue: &str) -> usize {
        self.lock()
            .queues
            .get(queue)
            .map_or(0, |q| q.messages.len())
    }

    /// Deliveries handed out from `queue` but not yet settled.
    #[must_use]
    pub fn unacked_count(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map_or(0, |q| q.unacked)
    }
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    // A poisoned lock only means a test thread panicked mid-update; the
    // queue data itself is still usable.
    inner
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl EventPublisher for InMemoryBus {
    async fn publish_raw(&self, routing_key: &str, body: Vec<u8>) -> Result<(), BusError> {
        let mut inner = self.lock();
        if inner.fail_publish {
            return Err(BusError::Publish("in-memory bus set to fail".to_string()));
        }

        inner.published.push(PublishedEvent {
            routing_key: routing_key.to_string(),
            body: body.clone(),
            content_type: "application/json",
            persistent: true,
            timestamp: Utc::now(),
        });

        for state in inner.queues.values_mut() {
            if state
                .patterns
                .iter()
                .any(|p| routing::topic_matches(p, routing_key))
            {
                state.messages.push_back(QueuedMessage {
                    routing_key: routing_key.to_string(),
                    body: body.clone(),
                    redelivered: false,
                });
                state.notify.notify_one();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventSource for InMemoryBus {
    async fn consume(
        &self,
        queue: &str,
        routing_keys: &[String],
    ) -> Result<DeliveryStream, BusError> {
        let notify = {
            let mut inner = self.lock();
            let state = inner.queues.entry(queue.to_string()).or_default();
            for key in routing_keys {
                if !state.patterns.contains(key) {
                    state.patterns.push(key.clone());
                }
            }
            Arc::clone(&state.notify)
        };

        let inner = Arc::clone(&self.inner);
        let queue = queue.to_string();
        let stream = futures::stream::unfold(
            (inner, queue, notify),
            |(inner, queue, notify)| async move {
                loop {
                    let next = {
                        let mut guard = lock_inner(&inner);
                        guard.queues.get_mut(&queue).and_then(|state| {
                            let message = state.messages.pop_front()?;
                            state.unacked += 1;
                            Some(message)
                        })
                    };

                    if let Some(message) = next {
                        let acker = MemoryAcker {
                            inner: Arc::clone(&inner),
                            queue: queue.clone(),
                            message: message.clone(),
                            settled: AtomicBool::new(false),
                        };
                        let delivery = Delivery::new(
                            message.routing_key,
                            message.body,
                            message.redelivered,
                            Box::new(acker),
                        );
                        return Some((Ok(delivery), (inner, queue, notify)));
                    }

                    notify.notified().await;
                }
            },
        );

        Ok(Box::pin(stream))
    }
}

struct MemoryAcker {
    inner: Arc<Mutex<Inner>>,
    queue: String,
    message: QueuedMessage,
    settled: AtomicBool,
}

impl MemoryAcker {
    fn settle(&self, requeue: bool) -> Result<(), BusError> {
        if self.settled.swap(true, Ordering::SeqCst) {
            return Err(BusError::Ack("delivery already settled".to_string()));
        }
        let mut inner = lock_inner(&self.inner);
        let state = inner
            .queues
            .get_mut(&self.queue)
            .ok_or_else(|| BusError::Ack(format!("queue '{}' no longer exists", self.queue)))?;
        state.unacked = state.unacked.saturating_sub(1);
        if requeue {
            let mut message = self.message.clone();
            message.redelivered = true;
            state.messages.push_front(message);
            state.notify.notify_one();
        }
        Ok(())
    }
}

#[async_trait]
impl Acknowledge for MemoryAcker {
    async fn ack(&self) -> Result<(), BusError> {
        self.settle(false)
    }

    async fn nack(&self, requeue: bool) -> Result<(), BusError> {
        self.settle(requeue)
    }
}

impl Drop for MemoryAcker {
    fn drop(&mut self) {
        if !self.settled.load(Ordering::SeqCst) {
            let _ = self.settle(true);
        }
    }
}
