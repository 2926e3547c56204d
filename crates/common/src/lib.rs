//! Shared plumbing for the LMS services: configuration helpers, secrets,
//! the event backbone, gateway identity extraction, and process lifecycle.

#![warn(clippy::pedantic)]

/// Environment-driven configuration blocks shared by every service
pub mod config;

/// Topic-routed event bus (AMQP transport, in-memory transport, consumer runner)
pub mod events;

/// HTTP error bodies, shared middleware stack, and request metrics
pub mod http;

/// Identity headers stamped by the edge gateway
pub mod identity;

/// Tracing and metrics bootstrap
pub mod observability;

/// Secret types that prevent accidental logging
pub mod secret;

/// Shutdown signal handling
pub mod shutdown;
