//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_requests_total` (counter): requests by endpoint and status
//! - `bridge_denials_total` (counter): denials by log category
//! - `bridge_request_duration_seconds` (histogram): gate + dispatch latency by endpoint
//! - `bridge_forward_duration_seconds` (histogram): upstream latency by mode and outcome
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(endpoint: &str, status: u16, start: Instant) {
    counter!(
        "bridge_requests_total",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("bridge_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_denial(endpoint: &str, log_category: &'static str) {
    counter!(
        "bridge_denials_total",
        "endpoint" => endpoint.to_string(),
        "category" => log_category
    )
    .increment(1);
}

pub fn record_forward(mode: &'static str, outcome: &'static str, start: Instant) {
    histogram!(
        "bridge_forward_duration_seconds",
        "mode" => mode,
        "outcome" => outcome
    )
    .record(start.elapsed().as_secs_f64());
}
