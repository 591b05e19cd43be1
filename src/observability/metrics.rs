//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `gate_decisions_total` (counter): access gate outcomes
//! - `rate_limited_total` (counter): limiter rejections by scope
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics exporter started");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("http_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_gate_decision(outcome: &'static str) {
    counter!("gate_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_rate_limited(scope: &'static str) {
    counter!("rate_limited_total", "scope" => scope).increment(1);
}
