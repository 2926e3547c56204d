//! Tracing and Prometheus bootstrap plus the cross-service metric families.
//!
//! Metric names are shared by every service; the owning service is attached
//! as a global `service` label when the recorder is installed.
//!
//! | Metric | Type | Labels |
//! |---|---|---|
//! | `lms_http_requests_total` | counter | method, path, status |
//! | `lms_http_request_duration_seconds` | histogram | method, path, status |
//! | `lms_events_published_total` | counter | routing_key, status |
//! | `lms_events_consumed_total` | counter | queue, outcome |
//! | `lms_event_handle_duration_seconds` | histogram | queue, outcome |

use axum::extract::State;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides `default_directives`. `LOG_FORMAT=json` switches to
/// newline-delimited JSON output.
pub fn init_tracing(default_directives: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Install the Prometheus recorder with a global `service` label.
///
/// # Errors
///
/// Returns an error when bucket configuration is rejected or a recorder is
/// already installed.
pub fn init_metrics_recorder(service: &str) -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .add_global_label("service", service)
        .set_buckets_for_metric(
            Matcher::Prefix("lms_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("lms_event_handle".to_string()),
            &[0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.000, 5.000],
        )
        .map_err(|e| format!("Failed to set event handling buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// `GET /metrics`
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    histogram!("lms_http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("lms_http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_event_published(routing_key: &str, success: bool) {
    counter!(
        "lms_events_published_total",
        "routing_key" => routing_key.to_string(),
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

pub fn record_event_consumed(queue: &str, outcome: &'static str, duration: Duration) {
    counter!(
        "lms_events_consumed_total",
        "queue" => queue.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!(
        "lms_event_handle_duration_seconds",
        "queue" => queue.to_string(),
        "outcome" => outcome
    )
    .record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without an installed recorder these are no-ops; they must not panic.
    #[test]
    fn test_recorders_without_global_recorder() {
        record_http_request("GET", "/health", 200, Duration::from_millis(3));
        record_event_published("user.user.updated", true);
        record_event_consumed("enrollment.queue", "acked", Duration::from_millis(1));
    }
}
