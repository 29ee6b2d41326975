//! Session entry point.
//!
//! # States
//! ```text
//! AwaitingHeader → Relaying → Closed
//! AwaitingHeader → Failed
//! ```
//!
//! # Design Decisions
//! - One function owns the inbound channel for the whole session
//! - Every exit path closes the inbound channel exactly once more (closing is
//!   idempotent, so the bridge having closed it already is harmless)
//! - Failures are logged with the session id and destination, then swallowed

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

use crate::config::TunnelConfig;
use crate::lifecycle::Shutdown;
use crate::net::SessionId;
use crate::observability::metrics;
use crate::protocol::{parse_header, AuthToken, TokenError};
use crate::tunnel::bridge::{bridge, BridgeConfig, RelayStats};
use crate::tunnel::channel::{ChunkSink, ChunkSource};
use crate::tunnel::connector::{Connector, TcpConnector};
use crate::tunnel::error::TunnelError;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the first inbound chunk.
    AwaitingHeader,
    /// Outbound connected, both legs running.
    Relaying,
    /// Ended normally; both channels closed.
    Closed,
    /// Ended by an error; inbound closed.
    Failed,
}

impl SessionState {
    fn advance(&mut self, next: SessionState) {
        tracing::trace!(from = ?*self, to = ?next, "Session state change");
        *self = next;
    }
}

/// Read-only settings shared by every session.
#[derive(Debug, Clone)]
pub struct SessionSettings<C = TcpConnector> {
    pub token: AuthToken,
    pub connector: C,
    pub bridge: BridgeConfig,
}

impl SessionSettings<TcpConnector> {
    /// Build from a validated configuration.
    pub fn from_config(config: &TunnelConfig) -> Result<Self, TokenError> {
        Ok(Self {
            token: AuthToken::parse(&config.auth.user_id)?,
            connector: TcpConnector::new(
                Duration::from_secs(config.outbound.connect_timeout_secs),
                config.outbound.nodelay,
            ),
            bridge: BridgeConfig {
                fallback_host: config.outbound.fallback_host.clone(),
                buffer_size: config.outbound.buffer_size,
            },
        })
    }
}

/// How a session ended.
#[derive(Debug)]
pub struct SessionOutcome {
    pub state: SessionState,
    pub stats: RelayStats,
    pub error: Option<TunnelError>,
}

impl SessionOutcome {
    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match &self.error {
            Some(e) => e.kind(),
            None => "closed",
        }
    }
}

/// Drive one inbound channel from handshake to teardown.
///
/// Never returns an error: failures are logged and reported in the outcome.
/// `shutdown` is the process-wide stop signal.
pub async fn run_session<S, K, C>(
    id: SessionId,
    mut source: S,
    mut sink: K,
    settings: Arc<SessionSettings<C>>,
    shutdown: Shutdown,
) -> SessionOutcome
where
    S: ChunkSource,
    K: ChunkSink,
    C: Connector,
{
    let span = tracing::info_span!(
        "session",
        session_id = %id,
        destination = tracing::field::Empty
    );
    let start_time = Instant::now();

    let outcome = drive(&mut source, &mut sink, &settings, &shutdown)
        .instrument(span.clone())
        .await;

    // Single cleanup point for every path.
    if let Err(e) = sink.close().await {
        span.in_scope(|| tracing::debug!(error = %e, "Inbound close failed"));
    }

    span.in_scope(|| match &outcome.error {
        None => tracing::info!(
            upstream_bytes = outcome.stats.upstream_bytes,
            downstream_bytes = outcome.stats.downstream_bytes,
            "Session closed"
        ),
        Some(e @ (TunnelError::MalformedHeader(_) | TunnelError::UnauthorizedToken)) => {
            tracing::warn!(error = %e, kind = e.kind(), "Handshake rejected")
        }
        Some(e) => tracing::warn!(error = %e, kind = e.kind(), "Session failed"),
    });
    metrics::record_session(outcome.label(), start_time);

    outcome
}

async fn drive<S, K, C>(
    source: &mut S,
    sink: &mut K,
    settings: &SessionSettings<C>,
    shutdown: &Shutdown,
) -> SessionOutcome
where
    S: ChunkSource,
    K: ChunkSink,
    C: Connector,
{
    let mut state = SessionState::AwaitingHeader;
    let fail = |state: &mut SessionState, error: TunnelError| {
        state.advance(SessionState::Failed);
        SessionOutcome {
            state: *state,
            stats: RelayStats::default(),
            error: Some(error),
        }
    };

    let first = tokio::select! {
        chunk = source.recv() => chunk,
        _ = shutdown.triggered() => None,
    };
    let first = match first {
        Some(Ok(chunk)) => chunk,
        Some(Err(e)) => return fail(&mut state, TunnelError::Inbound(e)),
        None => {
            tracing::debug!("Inbound closed before handshake");
            state.advance(SessionState::Closed);
            return SessionOutcome {
                state,
                stats: RelayStats::default(),
                error: None,
            };
        }
    };

    let header = match parse_header(&first, &settings.token) {
        Ok(header) => header,
        Err(e) => return fail(&mut state, e.into()),
    };

    tracing::Span::current().record("destination", header.destination().as_str());
    tracing::debug!(version = header.version, "Handshake accepted");
    state.advance(SessionState::Relaying);

    // Per-session teardown, also fired by process shutdown.
    let teardown = Shutdown::new();
    let relay = bridge(
        source,
        sink,
        &settings.connector,
        &settings.bridge,
        &header,
        &first[header.payload_offset..],
        &teardown,
    );
    tokio::pin!(relay);

    let result = tokio::select! {
        r = &mut relay => r,
        _ = shutdown.triggered() => {
            tracing::debug!("Process shutdown, tearing down session");
            teardown.trigger();
            relay.await
        }
    };

    match result {
        Ok(stats) => {
            state.advance(SessionState::Closed);
            SessionOutcome {
                state,
                stats,
                error: None,
            }
        }
        Err(e) => fail(&mut state, e),
    }
}
