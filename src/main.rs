//! VLESS-over-WebSocket tunnel endpoint.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌────────────────────────────────────────────────────┐
//!                     │                     TUNNEL                         │
//!                     │                                                    │
//!   Client (WS)       │  ┌─────────┐   ┌──────────┐   ┌────────────────┐   │
//!   ──────────────────┼─▶│  http   │──▶│ protocol │──▶│    tunnel      │   │
//!                     │  │ server  │   │  header  │   │ session/bridge │   │
//!                     │  └─────────┘   └──────────┘   └───────┬────────┘   │
//!                     │                                       │ TCP        │
//!                     │                                       ▼            │
//!   Client (WS)       │                               ┌────────────────┐   │
//!   ◀─────────────────┼───────────── relay ◀──────────│   connector    │◀──┼── Destination
//!                     │                               └────────────────┘   │
//!                     │                                                    │
//!                     │  config · net (admission) · observability ·        │
//!                     │  lifecycle (startup / signals / shutdown)          │
//!                     └────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use vless_tunnel::config::active_env_overrides;
use vless_tunnel::lifecycle::startup;
use vless_tunnel::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "vless-tunnel")]
#[command(about = "VLESS-over-WebSocket tunnel endpoint", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = startup::load(args.config.as_deref(), args.bind)?;

    init_logging(&config.observability);

    tracing::info!("vless-tunnel v{} starting", env!("CARGO_PKG_VERSION"));
    let overrides = active_env_overrides(|key| std::env::var(key).ok());
    if !overrides.is_empty() {
        tracing::info!(vars = ?overrides, "Configuration overridden from environment");
    }
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_sessions = config.listener.max_sessions,
        connect_timeout_secs = config.outbound.connect_timeout_secs,
        fallback_host = config.outbound.fallback_host.as_deref().unwrap_or("-"),
        "Configuration loaded"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
