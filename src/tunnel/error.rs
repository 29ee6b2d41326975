//! Session error taxonomy.

use std::io;
use thiserror::Error;

use crate::protocol::HeaderError;

/// Outbound connection failure. Refused, unreachable, DNS and timeout all
/// collapse into this one kind.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connect to {destination} failed: {source}")]
    Io {
        destination: String,
        #[source]
        source: io::Error,
    },

    #[error("connect to {destination} timed out after {secs}s")]
    Timeout { destination: String, secs: u64 },
}

/// Which way bytes were flowing when a relay leg failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    /// Inbound channel → outbound stream.
    Upstream,
    /// Outbound stream → inbound channel.
    Downstream,
}

impl std::fmt::Display for Leg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Leg::Upstream => f.write_str("upstream"),
            Leg::Downstream => f.write_str("downstream"),
        }
    }
}

/// Everything that can end a session early. All are terminal for the session
/// and none escape the session boundary.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("malformed handshake: {0}")]
    MalformedHeader(HeaderError),

    #[error("unauthorized handshake")]
    UnauthorizedToken,

    #[error(transparent)]
    ConnectFailed(#[from] ConnectError),

    #[error("{leg} relay failed: {source}")]
    RelayIo {
        leg: Leg,
        #[source]
        source: io::Error,
    },

    #[error("inbound channel failed before handshake: {0}")]
    Inbound(#[source] io::Error),
}

impl From<HeaderError> for TunnelError {
    fn from(err: HeaderError) -> Self {
        match err {
            HeaderError::UnauthorizedToken => TunnelError::UnauthorizedToken,
            other => TunnelError::MalformedHeader(other),
        }
    }
}

impl TunnelError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TunnelError::MalformedHeader(_) => "malformed_header",
            TunnelError::UnauthorizedToken => "unauthorized",
            TunnelError::ConnectFailed(_) => "connect_failed",
            TunnelError::RelayIo { .. } => "relay_io",
            TunnelError::Inbound(_) => "inbound_io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_errors_split_by_kind() {
        let malformed: TunnelError = HeaderError::TooShort { needed: 24, actual: 3 }.into();
        assert_eq!(malformed.kind(), "malformed_header");

        let unauthorized: TunnelError = HeaderError::UnauthorizedToken.into();
        assert_eq!(unauthorized.kind(), "unauthorized");
    }

    #[test]
    fn connect_error_message_names_destination() {
        let err: TunnelError = ConnectError::Timeout {
            destination: "example.com:443".into(),
            secs: 5,
        }
        .into();
        assert_eq!(err.kind(), "connect_failed");
        assert!(err.to_string().contains("example.com:443"));
    }
}
