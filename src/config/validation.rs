//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the user id format (startup is fatal otherwise)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TunnelConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::TunnelConfig;
use crate::protocol::AuthToken;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a loaded configuration for semantic errors.
pub fn validate_config(config: &TunnelConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = AuthToken::parse(&config.auth.user_id) {
        errors.push(ValidationError::new("auth.user_id", e.to_string()));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {:?}", config.listener.bind_address),
        ));
    }
    if config.listener.max_sessions == 0 {
        errors.push(ValidationError::new("listener.max_sessions", "must be > 0"));
    }

    if config.outbound.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("outbound.connect_timeout_secs", "must be > 0"));
    }
    if config.outbound.buffer_size == 0 {
        errors.push(ValidationError::new("outbound.buffer_size", "must be > 0"));
    }
    if let Some(host) = &config.outbound.fallback_host {
        if host.trim().is_empty() {
            errors.push(ValidationError::new("outbound.fallback_host", "must not be blank"));
        }
    }

    if config.websocket.max_message_size == 0 {
        errors.push(ValidationError::new("websocket.max_message_size", "must be > 0"));
    }

    if !config.share.path.starts_with('/') {
        errors.push(ValidationError::new("share.path", "must start with '/'"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
