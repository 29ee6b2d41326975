//! Startup orchestration.
//!
//! # Responsibilities
//! - Start background tasks (signals, metrics)
//! - Build the server from a validated configuration
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{load_config, ConfigError, TunnelConfig};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::protocol::TokenError;

/// Errors that abort the process before or while serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid user id: {0}")]
    Token(#[from] TokenError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Load the configuration and apply the command-line bind override.
pub fn load(path: Option<&Path>, bind: Option<SocketAddr>) -> Result<TunnelConfig, StartupError> {
    let mut config = load_config(path)?;
    if let Some(bind) = bind {
        config.listener.bind_address = bind.to_string();
    }
    Ok(config)
}

/// Serve `config` until SIGINT/SIGTERM.
pub async fn run(config: TunnelConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, shutdown)?;

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;

    server.run(listener).await.map_err(StartupError::Serve)
}
