//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sessions produce:
//!     → logging.rs (structured log events, one span per session)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Session ID and destination flow through every session event
//! - Logging never blocks the relay

pub mod logging;
pub mod metrics;
