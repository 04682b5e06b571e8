//! Prometheus metrics for Labhook
//!
//! Exposes metrics at `/metrics` endpoint in Prometheus format.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;

/// Metric names
pub mod names {
    pub const WEBHOOK_REQUESTS_TOTAL: &str = "labhook_webhook_requests_total";
    pub const WEBHOOK_REQUEST_DURATION_SECONDS: &str = "labhook_webhook_request_duration_seconds";
    pub const WEBHOOK_SUBSCRIBER_FAILURES_TOTAL: &str = "labhook_webhook_subscriber_failures_total";

    pub const UPTIME_SECONDS: &str = "labhook_uptime_seconds";
    pub const INFO: &str = "labhook_info";
}

/// How the webhook middleware disposed of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    PassedThrough,
    Accepted,
    Rejected,
    Failed,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PassedThrough => "passed_through",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

/// Record a webhook request.
///
/// Uses the global `metrics` recorder; without an installed recorder this
/// is a no-op.
pub fn record_webhook_request(outcome: RequestOutcome, duration_secs: f64) {
    counter!(names::WEBHOOK_REQUESTS_TOTAL, "outcome" => outcome.as_str()).increment(1);

    if outcome != RequestOutcome::PassedThrough {
        histogram!(
            names::WEBHOOK_REQUEST_DURATION_SECONDS,
            "outcome" => outcome.as_str()
        )
        .record(duration_secs);
    }
}

/// Record a subscriber that returned an error
pub fn record_subscriber_failure(channel: &str) {
    counter!(
        names::WEBHOOK_SUBSCRIBER_FAILURES_TOTAL,
        "channel" => channel.to_string()
    )
    .increment(1);
}

/// Metrics recorder
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
    start_time: Instant,
}

impl MetricsRecorder {
    /// Install the Prometheus recorder as the global `metrics` recorder
    pub fn install() -> Result<Self, BuildError> {
        let handle = PrometheusBuilder::new().install_recorder()?;

        gauge!(names::INFO, "version" => labhook_core::VERSION).set(1.0);

        Ok(Self::from_handle(handle))
    }

    /// Wrap a handle whose recorder is managed elsewhere
    pub fn from_handle(handle: PrometheusHandle) -> Self {
        Self {
            handle,
            start_time: Instant::now(),
        }
    }

    /// Get metrics output in Prometheus format
    pub fn render(&self) -> String {
        gauge!(names::UPTIME_SECONDS).set(self.start_time.elapsed().as_secs_f64());

        self.handle.render()
    }
}

/// Handler for /metrics endpoint
pub async fn metrics_handler(State(metrics): State<Arc<MetricsRecorder>>) -> impl IntoResponse {
    let output = metrics.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}
