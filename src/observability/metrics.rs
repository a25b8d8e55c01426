//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_upgrade_outcomes_total` (counter): dispatch outcomes by label
//! - `gateway_handshake_duration_seconds` (histogram): dispatch-to-101 latency
//! - `gateway_active_sessions` (gauge): live sessions by endpoint
//! - `gateway_session_messages_total` (counter): inbound data messages
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   exporter every call is a no-op, which keeps tests quiet
//! - Prometheus exposition via metrics-exporter-prometheus

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_upgrade_outcome(outcome: &'static str) {
    counter!("gateway_upgrade_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_handshake_duration(endpoint: &str, start: Instant) {
    histogram!("gateway_handshake_duration_seconds", "endpoint" => endpoint.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn session_opened(endpoint: &str) {
    gauge!("gateway_active_sessions", "endpoint" => endpoint.to_string()).increment(1.0);
}

pub fn session_closed(endpoint: &str) {
    gauge!("gateway_active_sessions", "endpoint" => endpoint.to_string()).decrement(1.0);
}

pub fn record_session_message(endpoint: &str) {
    counter!("gateway_session_messages_total", "endpoint" => endpoint.to_string()).increment(1);
}
