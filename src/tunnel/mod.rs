//! Tunnel subsystem: one session per inbound connection.
//!
//! # Data Flow
//! ```text
//! inbound channel (ChunkSource + ChunkSink)
//!     → session.rs (first chunk → protocol::parse_header)
//!     → bridge.rs (connector.rs connect, payload write, two relay legs)
//!     → both channels closed when either leg ends
//! ```
//!
//! # Design Decisions
//! - Transport-agnostic: WebSocket specifics live in `http::websocket`
//! - No state shared between sessions except read-only `SessionSettings`
//! - Errors stop at the session boundary; the process keeps serving

pub mod bridge;
pub mod channel;
pub mod connector;
pub mod error;
pub mod session;

pub use bridge::{BridgeConfig, RelayStats};
pub use channel::{ChunkSink, ChunkSource};
pub use connector::{Connector, TcpConnector};
pub use error::{ConnectError, Leg, TunnelError};
pub use session::{run_session, SessionOutcome, SessionSettings, SessionState};
