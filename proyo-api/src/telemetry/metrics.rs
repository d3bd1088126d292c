//! Prometheus Metrics Definitions
//!
//! Defines the gateway metrics and exposes them on /metrics for scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Store query latency buckets (seconds)
const QUERY_LATENCY_BUCKETS: &[f64] =
    &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0];

/// Global metrics instance - initialized on first use
pub static METRICS: Lazy<ApiResult<GatewayMetrics>> = Lazy::new(GatewayMetrics::new);

/// The registered metrics, or `None` when registration failed.
///
/// Recording is best effort; a registration failure is logged once and
/// every later record call becomes a no-op.
pub fn metrics() -> Option<&'static GatewayMetrics> {
    static REPORTED: std::sync::Once = std::sync::Once::new();
    match METRICS.as_ref() {
        Ok(metrics) => Some(metrics),
        Err(e) => {
            REPORTED.call_once(|| tracing::error!(error = %e, "Metrics unavailable"));
            None
        }
    }
}

#[derive(Clone)]
pub struct GatewayMetrics {
    /// HTTP request counter - labels: method, path, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Command dispatch counter - labels: command, outcome
    pub command_dispatches_total: CounterVec,

    /// Command dispatch duration histogram - labels: command, strategy
    pub command_dispatch_duration_seconds: HistogramVec,

    /// Store query counter - labels: status
    pub query_executions_total: CounterVec,

    /// Store query duration histogram - labels: status
    pub query_duration_seconds: HistogramVec,

    /// Webhook invocation counter - labels: status
    pub webhook_invocations_total: CounterVec,

    /// Webhooks currently registered
    pub registered_webhooks: Gauge,
}

impl GatewayMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "proyo_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "proyo_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            command_dispatches_total: register_counter_vec!(
                "proyo_command_dispatches_total",
                "Total command dispatches by command code and outcome",
                &["command", "outcome"]
            )
            .map_err(|e| registration_error("command_dispatches_total", e))?,

            command_dispatch_duration_seconds: register_histogram_vec!(
                "proyo_command_dispatch_duration_seconds",
                "Command dispatch duration in seconds",
                &["command", "strategy"],
                QUERY_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("command_dispatch_duration_seconds", e))?,

            query_executions_total: register_counter_vec!(
                "proyo_query_executions_total",
                "Total store queries executed",
                &["status"]
            )
            .map_err(|e| registration_error("query_executions_total", e))?,

            query_duration_seconds: register_histogram_vec!(
                "proyo_query_duration_seconds",
                "Store query duration in seconds",
                &["status"],
                QUERY_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("query_duration_seconds", e))?,

            webhook_invocations_total: register_counter_vec!(
                "proyo_webhook_invocations_total",
                "Total webhook invocations",
                &["status"]
            )
            .map_err(|e| registration_error("webhook_invocations_total", e))?,

            registered_webhooks: register_gauge!(
                "proyo_registered_webhooks",
                "Current number of registered webhooks"
            )
            .map_err(|e| registration_error("registered_webhooks", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status_str.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a finished command dispatch; `outcome` is "success" or an error kind.
    pub fn record_dispatch(&self, command: &str, strategy: &str, outcome: &str, duration_secs: f64) {
        self.command_dispatches_total
            .with_label_values(&[command, outcome])
            .inc();
        self.command_dispatch_duration_seconds
            .with_label_values(&[command, strategy])
            .observe(duration_secs);
    }

    /// Record one store query.
    pub fn record_query(&self, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.query_executions_total.with_label_values(&[status]).inc();
        self.query_duration_seconds
            .with_label_values(&[status])
            .observe(duration_secs);
    }

    /// Record a webhook invocation.
    pub fn record_webhook_invocation(&self, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.webhook_invocations_total
            .with_label_values(&[status])
            .inc();
    }

    pub fn set_registered_webhooks(&self, count: usize) {
        self.registered_webhooks.set(count as f64);
    }
}

fn registration_error(name: &str, err: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, err))
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    // Make sure the gateway families exist even before the first request.
    let _ = metrics();

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
