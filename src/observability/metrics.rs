//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by rule, status
//! - `gateway_request_duration_seconds` (histogram): latency by rule
//! - `gateway_buffers_released_total` (counter): inbound buffers released
//! - `gateway_released_bytes_total` (counter): bytes freed by those releases
//! - `gateway_context_build_failures_total` (counter): by missing field
//! - `gateway_filter_errors_total` (counter): by filter id
//! - `gateway_config_reloads_total` (counter): by outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests free of setup

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(rule: &str, status: u16, start: Instant) {
    let rule = rule.to_string();
    ::metrics::counter!(
        "gateway_requests_total",
        "rule" => rule.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", "rule" => rule)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_buffer_release(bytes: usize) {
    ::metrics::counter!("gateway_buffers_released_total").increment(1);
    ::metrics::counter!("gateway_released_bytes_total").increment(bytes as u64);
}

pub fn record_context_build_failure(field: &'static str) {
    ::metrics::counter!("gateway_context_build_failures_total", "field" => field).increment(1);
}

pub fn record_filter_error(filter: &'static str) {
    ::metrics::counter!("gateway_filter_errors_total", "filter" => filter).increment(1);
}

pub fn record_config_reload(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    ::metrics::counter!("gateway_config_reloads_total", "outcome" => outcome).increment(1);
}
