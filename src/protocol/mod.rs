//! Handshake wire protocol.
//!
//! # Data Flow
//! ```text
//! first inbound chunk
//!     → header.rs (bounds checks, token check, address + port decode)
//!     → HandshakeHeader { version, host, port, payload_offset }
//!     → tunnel::session (connect + relay)
//! ```
//!
//! # Design Decisions
//! - Parsing is a pure function over one contiguous buffer; no I/O
//! - The whole header must arrive in the first chunk ("need more data" is a failure)
//! - The expected token is parsed once at startup and shared read-only

pub mod auth;
pub mod header;

pub use auth::{AuthToken, TokenError};
pub use header::{encode_header, parse_header, HandshakeHeader, HeaderError, MIN_HEADER_LEN};
