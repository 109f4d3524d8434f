//! Metrics collection and exposition.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize the Prometheus exporter and scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus recorder");

    tracing::info!("Metrics server listening on http://{}", addr);
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, latency: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];

    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels).record(latency.as_secs_f64());
}

/// Record a 429 rejection.
pub fn record_rate_limited(reason: &str) {
    counter!("gateway_rate_limited_total", "reason" => reason.to_string()).increment(1);
}

/// Record an upstream transport failure.
pub fn record_upstream_error(upstream: &str) {
    counter!("gateway_upstream_errors_total", "upstream" => upstream.to_string()).increment(1);
}
