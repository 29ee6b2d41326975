//! Outbound connector.
//!
//! # Responsibilities
//! - Open a byte stream to `(host, port)` with a deadline
//! - Retry once against the configured fallback host
//!
//! # Design Decisions
//! - A trait seam so sessions can be driven against in-memory streams
//! - Every connect attempt has a timeout; unreachable hosts cannot pin a session

use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::tunnel::error::ConnectError;

/// Opens outbound streams.
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    fn connect(
        &self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Stream, ConnectError>> + Send;
}

/// Plain TCP connector.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
    nodelay: bool,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration, nodelay: bool) -> Self {
        Self {
            connect_timeout,
            nodelay,
        }
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream, ConnectError> {
        let destination = format!("{}:{}", host, port);
        let attempt = TcpStream::connect((host, port));

        let stream = match tokio::time::timeout(self.connect_timeout, attempt).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(ConnectError::Io { destination, source }),
            Err(_) => {
                return Err(ConnectError::Timeout {
                    destination,
                    secs: self.connect_timeout.as_secs(),
                })
            }
        };

        if self.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
            }
        }

        Ok(stream)
    }
}

/// Connect to `host:port`, then to `fallback:port` if the first attempt fails.
///
/// Returns the stream and the host actually reached. When both attempts fail
/// the fallback's error is returned.
pub async fn connect_with_fallback<C: Connector>(
    connector: &C,
    host: &str,
    port: u16,
    fallback: Option<&str>,
) -> Result<(C::Stream, String), ConnectError> {
    let err = match connector.connect(host, port).await {
        Ok(stream) => return Ok((stream, host.to_string())),
        Err(e) => e,
    };

    match fallback {
        Some(fallback) if fallback != host => {
            tracing::warn!(
                error = %err,
                fallback = %fallback,
                "Destination unreachable, trying fallback host"
            );
            let stream = connector.connect(fallback, port).await?;
            Ok((stream, fallback.to_string()))
        }
        _ => Err(err),
    }
}
