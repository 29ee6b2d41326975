//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tunnel_sessions_total` (counter): finished sessions by outcome
//! - `tunnel_session_duration_seconds` (histogram): session lifetime
//! - `tunnel_active_sessions` (gauge): current session count
//! - `tunnel_bytes_total` (counter): relayed bytes by direction
//!
//! # Design Decisions
//! - Macros are no-ops until a recorder is installed, so tests need no setup
//! - Labels are static strings to keep cardinality bounded

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Relay direction label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client → destination.
    Upstream,
    /// Destination → client.
    Downstream,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upstream => "upstream",
            Direction::Downstream => "downstream",
        }
    }
}

/// Initialize the Prometheus exporter.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    match builder.install() {
        Ok(_) => tracing::info!(address = %addr, "Metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics exporter"),
    }
}

/// Record a finished session.
pub fn record_session(outcome: &'static str, start_time: Instant) {
    counter!("tunnel_sessions_total", "outcome" => outcome).increment(1);
    histogram!("tunnel_session_duration_seconds").record(start_time.elapsed().as_secs_f64());
}

/// Record relayed bytes.
pub fn record_bytes(direction: Direction, bytes: u64) {
    counter!("tunnel_bytes_total", "direction" => direction.as_str()).increment(bytes);
}

/// Update the live session gauge.
pub fn set_active_sessions(count: u64) {
    gauge!("tunnel_active_sessions").set(count as f64);
}
