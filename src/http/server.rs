//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create Axum Router with the single dispatcher
//! - Wire up middleware (tracing, timeouts)
//! - Admit WebSocket upgrades and hand them to tunnel sessions
//! - Serve the service document and the share link
//! - Drain live sessions on shutdown

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State, WebSocketUpgrade},
    http::{header, HeaderMap, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::TunnelConfig;
use crate::http::share::share_link;
use crate::http::websocket::{decode_early_data, split_socket};
use crate::lifecycle::Shutdown;
use crate::net::SessionTracker;
use crate::observability::metrics;
use crate::protocol::TokenError;
use crate::tunnel::{run_session, SessionSettings};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TunnelConfig>,
    pub settings: Arc<SessionSettings>,
    pub sessions: SessionTracker,
    pub shutdown: Shutdown,
}

/// HTTP front door for the tunnel.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new server. Fails if the configured user id is invalid.
    pub fn new(config: TunnelConfig, shutdown: Shutdown) -> Result<Self, TokenError> {
        let settings = Arc::new(SessionSettings::from_config(&config)?);
        let state = AppState {
            sessions: SessionTracker::new(config.listener.max_sessions),
            config: Arc::new(config),
            settings,
            shutdown,
        };

        let router = Self::build_router(&state);
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: &AppState) -> Router {
        Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            .with_state(state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(
                state.config.timeouts.request_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// The configured router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Live session tracker.
    pub fn sessions(&self) -> &SessionTracker {
        &self.state.sessions
    }

    /// Run until the shutdown signal fires, then drain live sessions.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let shutdown = self.state.shutdown.clone();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.triggered().await })
            .await?;

        let drain = Duration::from_secs(self.state.config.timeouts.drain_secs);
        let sessions = &self.state.sessions;
        tracing::info!(active_sessions = sessions.active_count(), "Draining sessions");
        if tokio::time::timeout(drain, sessions.wait_idle()).await.is_err() {
            tracing::warn!(
                active_sessions = sessions.active_count(),
                "Drain timeout elapsed with sessions still open"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Single entry point: upgrade requests become tunnels, everything else is
/// the service document, the share link, or 404.
async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    if is_websocket_upgrade(request.headers()) {
        let (mut parts, _body) = request.into_parts();
        return match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
            Ok(upgrade) => start_tunnel(state, peer, &parts.headers, upgrade),
            Err(rejection) => rejection.into_response(),
        };
    }

    let path = request.uri().path();
    if path == "/" {
        return Json(serde_json::json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "active_sessions": state.sessions.active_count(),
        }))
        .into_response();
    }

    if path.strip_prefix('/') == Some(state.config.auth.user_id.as_str()) {
        let host = request
            .headers()
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| request.uri().host())
            .unwrap_or("localhost");
        let link = share_link(&state.config.auth.user_id, host, &state.config.share);
        return (
            [(header::CONTENT_TYPE, "text/plain;charset=utf-8")],
            link,
        )
            .into_response();
    }

    (StatusCode::NOT_FOUND, "Not found").into_response()
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

fn start_tunnel(
    state: AppState,
    peer: SocketAddr,
    headers: &HeaderMap,
    upgrade: WebSocketUpgrade,
) -> Response {
    let guard = match state.sessions.try_track() {
        Some(guard) => guard,
        None => {
            tracing::warn!(
                peer = %peer,
                max_sessions = state.config.listener.max_sessions,
                "Session limit reached, refusing upgrade"
            );
            metrics::record_session("rejected", Instant::now());
            return (StatusCode::SERVICE_UNAVAILABLE, "Too many sessions").into_response();
        }
    };

    let mut upgrade = upgrade.max_message_size(state.config.websocket.max_message_size);
    let mut early_data = None;

    if state.config.websocket.early_data {
        if let Some(protocol) = headers
            .get(header::SEC_WEBSOCKET_PROTOCOL)
            .and_then(|v| v.to_str().ok())
        {
            match decode_early_data(protocol) {
                Ok(data) => {
                    early_data = data;
                    upgrade = upgrade.protocols([protocol.trim().to_string()]);
                }
                Err(e) => {
                    tracing::warn!(peer = %peer, error = %e, "Rejecting upgrade");
                    metrics::record_session("malformed_header", Instant::now());
                    return (StatusCode::BAD_REQUEST, "Invalid early data").into_response();
                }
            }
        }
    }

    let id = guard.id();
    tracing::debug!(
        session_id = %id,
        peer = %peer,
        early_data = early_data.is_some(),
        "Upgrading connection"
    );

    upgrade
        .on_failed_upgrade(move |e| {
            tracing::debug!(session_id = %id, error = %e, "WebSocket upgrade failed")
        })
        .on_upgrade(move |socket| async move {
            let _guard = guard;
            let (source, sink) = split_socket(socket, early_data);
            run_session(id, source, sink, state.settings, state.shutdown).await;
        })
}
