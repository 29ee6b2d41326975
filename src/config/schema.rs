//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the tunnel.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the tunnel endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TunnelConfig {
    /// Listener configuration (bind address, admission limit).
    pub listener: ListenerConfig,

    /// Client identity.
    pub auth: AuthConfig,

    /// Outbound connection settings.
    pub outbound: OutboundConfig,

    /// WebSocket transport settings.
    pub websocket: WebSocketConfig,

    /// Share link rendering.
    pub share: ShareConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent tunnel sessions.
    pub max_sessions: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_sessions: 10_000,
        }
    }
}

/// Client identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Canonical hyphenated v4 UUID that clients must present.
    pub user_id: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_id: "d342d11e-d424-4583-b36e-524ab1f0afa4".to_string(),
        }
    }
}

/// Outbound (destination side) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutboundConfig {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Host to try when the requested destination cannot be reached.
    pub fallback_host: Option<String>,

    /// Disable Nagle on outbound sockets.
    pub nodelay: bool,

    /// Read buffer size for the downstream leg, in bytes.
    pub buffer_size: usize,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            fallback_host: None,
            nodelay: true,
            buffer_size: 16 * 1024,
        }
    }
}

/// WebSocket transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Accept a first chunk carried in `Sec-WebSocket-Protocol`.
    pub early_data: bool,

    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            early_data: true,
            max_message_size: 64 << 20,
        }
    }
}

/// Share link configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Port advertised to clients (usually the TLS front).
    pub port: u16,

    /// WebSocket path advertised to clients.
    pub path: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            port: 443,
            path: "/?ed=2048".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Plain HTTP request timeout in seconds (not applied to tunnels).
    pub request_secs: u64,

    /// How long shutdown waits for live sessions, in seconds.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            drain_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
