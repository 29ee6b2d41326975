//! Connection bridge: outbound connect plus full-duplex relay.
//!
//! # Data Flow
//! ```text
//! handshake payload, then inbound chunks ──upstream leg──▶ outbound write half
//! outbound read half ──downstream leg──▶ inbound sink
//! ```
//!
//! # Design Decisions
//! - Both legs run concurrently in the session task; neither blocks the other
//! - The handshake payload is written by the upstream leg, so a destination
//!   that speaks first is read while the payload is still going out
//! - Teardown also cancels an outbound connect in progress
//! - The first leg to end triggers a shared teardown signal; the other stops
//! - Teardown closes both sides; close errors are logged, never propagated
//! - A chunk for an inbound channel that is no longer open is dropped

use axum::body::Bytes;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::lifecycle::Shutdown;
use crate::observability::metrics::{self, Direction};
use crate::protocol::HandshakeHeader;
use crate::tunnel::channel::{ChunkSink, ChunkSource};
use crate::tunnel::connector::{connect_with_fallback, Connector};
use crate::tunnel::error::{Leg, TunnelError};

/// Bridge tuning shared by every session.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Host tried when the requested destination is unreachable.
    pub fallback_host: Option<String>,
    /// Read buffer size for the downstream leg.
    pub buffer_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            fallback_host: None,
            buffer_size: 16 * 1024,
        }
    }
}

/// Bytes moved by one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub upstream_bytes: u64,
    pub downstream_bytes: u64,
}

/// Connect to the handshake's destination and relay until either side ends.
///
/// Nothing is written to the inbound channel if the connect fails.
pub async fn bridge<S, K, C>(
    source: &mut S,
    sink: &mut K,
    connector: &C,
    config: &BridgeConfig,
    header: &HandshakeHeader,
    leading_payload: &[u8],
    teardown: &Shutdown,
) -> Result<RelayStats, TunnelError>
where
    S: ChunkSource,
    K: ChunkSink,
    C: Connector,
{
    let connect = connect_with_fallback(
        connector,
        &header.host,
        header.port,
        config.fallback_host.as_deref(),
    );
    let (outbound, reached) = tokio::select! {
        r = connect => r?,
        _ = teardown.triggered() => {
            tracing::debug!("Teardown before destination connected");
            return Ok(RelayStats::default());
        }
    };

    tracing::info!(remote = %reached, port = header.port, "Connected to destination");

    relay(
        source,
        sink,
        outbound,
        leading_payload,
        Some(header.response_prefix()),
        config.buffer_size,
        teardown,
    )
    .await
}

/// Relay between an established outbound stream and the inbound channel.
///
/// `leading_payload` is written to `outbound` before any inbound chunk.
/// `response_prefix`, if any, is prepended to the first downstream chunk.
pub async fn relay<S, K, O>(
    source: &mut S,
    sink: &mut K,
    outbound: O,
    leading_payload: &[u8],
    response_prefix: Option<[u8; 2]>,
    buffer_size: usize,
    teardown: &Shutdown,
) -> Result<RelayStats, TunnelError>
where
    S: ChunkSource,
    K: ChunkSink,
    O: AsyncRead + AsyncWrite + Send + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(outbound);
    let mut upstream_bytes = 0u64;
    let mut downstream_bytes = 0u64;

    let upstream = async {
        let result = tokio::select! {
            r = forward_upstream(
                source,
                &mut writer,
                leading_payload,
                &mut upstream_bytes,
            ) => r,
            _ = teardown.triggered() => Ok(()),
        };
        teardown.trigger();
        result
    };

    let downstream = async {
        let result = tokio::select! {
            r = pump_downstream(
                &mut reader,
                sink,
                response_prefix,
                buffer_size,
                &mut downstream_bytes,
            ) => r,
            _ = teardown.triggered() => Ok(()),
        };
        teardown.trigger();
        result
    };

    let (up, down) = tokio::join!(upstream, downstream);
    let result = up.and(down);

    // Whatever ended the relay, both sides are closed.
    teardown.trigger();
    if let Err(e) = writer.shutdown().await {
        tracing::debug!(error = %e, "Outbound shutdown failed");
    }
    if let Err(e) = sink.close().await {
        tracing::debug!(error = %e, "Inbound close failed");
    }

    let stats = RelayStats {
        upstream_bytes,
        downstream_bytes,
    };
    tracing::debug!(upstream_bytes, downstream_bytes, "Relay finished");

    result.map(|()| stats)
}

async fn write_chunk<W>(writer: &mut W, chunk: &[u8]) -> Result<(), TunnelError>
where
    W: AsyncWrite + Unpin,
{
    let upstream_err = |source| TunnelError::RelayIo {
        leg: Leg::Upstream,
        source,
    };
    writer.write_all(chunk).await.map_err(upstream_err)?;
    writer.flush().await.map_err(upstream_err)
}

/// How the handshake payload write ended.
enum Leading {
    /// Fully written; carries the inbound chunk that arrived meanwhile, if any.
    Written(Option<io::Result<Bytes>>),
    /// The client ended its stream before the write finished.
    InboundEnded,
}

/// Write the handshake payload while still watching the inbound channel.
///
/// At most one inbound chunk is held back; it is forwarded after the payload.
async fn write_leading<S, W>(
    source: &mut S,
    writer: &mut W,
    payload: &[u8],
) -> Result<Leading, TunnelError>
where
    S: ChunkSource,
    W: AsyncWrite + Unpin,
{
    let write = write_chunk(writer, payload);
    tokio::pin!(write);
    let mut held = None;

    loop {
        tokio::select! {
            r = &mut write => {
                r?;
                return Ok(Leading::Written(held));
            }
            next = source.recv(), if held.is_none() => match next {
                Some(chunk) => held = Some(chunk),
                None => return Ok(Leading::InboundEnded),
            },
        }
    }
}

/// Inbound → outbound, in arrival order, until the client ends its stream.
///
/// `leading_payload` goes out before any inbound chunk.
async fn forward_upstream<S, W>(
    source: &mut S,
    writer: &mut W,
    leading_payload: &[u8],
    counter: &mut u64,
) -> Result<(), TunnelError>
where
    S: ChunkSource,
    W: AsyncWrite + Unpin,
{
    let mut next = None;
    if !leading_payload.is_empty() {
        match write_leading(source, writer, leading_payload).await? {
            Leading::Written(held) => next = held,
            Leading::InboundEnded => {
                tracing::debug!("Inbound stream ended during handshake payload write");
                return Ok(());
            }
        }
        *counter += leading_payload.len() as u64;
        metrics::record_bytes(Direction::Upstream, leading_payload.len() as u64);
    }

    loop {
        let chunk = match next.take() {
            Some(chunk) => chunk,
            None => match source.recv().await {
                Some(chunk) => chunk,
                None => break,
            },
        };
        let chunk = chunk.map_err(|source| TunnelError::RelayIo {
            leg: Leg::Upstream,
            source,
        })?;
        write_chunk(writer, &chunk).await?;
        *counter += chunk.len() as u64;
        metrics::record_bytes(Direction::Upstream, chunk.len() as u64);
    }
    tracing::debug!("Inbound stream ended");
    Ok(())
}

/// Outbound → inbound, in arrival order, until the destination ends its stream.
async fn pump_downstream<R, K>(
    reader: &mut R,
    sink: &mut K,
    mut prefix: Option<[u8; 2]>,
    buffer_size: usize,
    counter: &mut u64,
) -> Result<(), TunnelError>
where
    R: AsyncRead + Unpin,
    K: ChunkSink,
{
    let mut buf = vec![0u8; buffer_size];
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|source| TunnelError::RelayIo {
                leg: Leg::Downstream,
                source,
            })?;
        if n == 0 {
            tracing::debug!("Outbound stream ended");
            return Ok(());
        }
        if !sink.is_open() {
            tracing::debug!(bytes = n, "Inbound channel closed, dropping chunk");
            return Ok(());
        }

        let chunk = match prefix.take() {
            Some(prefix) => {
                let mut framed = Vec::with_capacity(prefix.len() + n);
                framed.extend_from_slice(&prefix);
                framed.extend_from_slice(&buf[..n]);
                Bytes::from(framed)
            }
            None => Bytes::copy_from_slice(&buf[..n]),
        };

        if let Err(e) = sink.send(chunk).await {
            tracing::debug!(error = %e, bytes = n, "Inbound send failed, dropping chunk");
            return Ok(());
        }
        *counter += n as u64;
        metrics::record_bytes(Direction::Downstream, n as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::channel::testing;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn leading_payload_precedes_later_chunks() {
        let (mut source, mut sink, client) = testing::channel();
        let (proxy_side, mut remote) = duplex(1024);
        let teardown = Shutdown::new();

        client.send(&[0xAA, 0xBB]);

        let relay = tokio::spawn(async move {
            relay(&mut source, &mut sink, proxy_side, &[1, 2, 3], None, 64, &teardown).await
        });

        let mut buf = [0u8; 5];
        tokio::time::timeout(WAIT, remote.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(buf, [1, 2, 3, 0xAA, 0xBB]);

        drop(remote);
        let stats = tokio::time::timeout(WAIT, relay).await.unwrap().unwrap().unwrap();
        assert_eq!(stats.upstream_bytes, 5);
        drop(client);
    }

    #[tokio::test]
    async fn response_prefix_only_on_first_chunk() {
        let (mut source, mut sink, mut client) = testing::channel();
        let (proxy_side, mut remote) = duplex(1024);
        let teardown = Shutdown::new();

        let relay = tokio::spawn(async move {
            relay(&mut source, &mut sink, proxy_side, &[], Some([0, 0]), 64, &teardown).await
        });

        remote.write_all(b"one").await.unwrap();
        let first = tokio::time::timeout(WAIT, client.from_proxy.recv()).await.unwrap().unwrap();
        assert_eq!(&first[..], b"\x00\x00one");

        remote.write_all(b"two").await.unwrap();
        let second = tokio::time::timeout(WAIT, client.from_proxy.recv()).await.unwrap().unwrap();
        assert_eq!(&second[..], b"two");

        drop(remote);
        let stats = tokio::time::timeout(WAIT, relay).await.unwrap().unwrap().unwrap();
        assert_eq!(stats.downstream_bytes, 6);
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn outbound_eof_closes_inbound() {
        let (mut source, mut sink, mut client) = testing::channel();
        let (proxy_side, remote) = duplex(1024);
        let teardown = Shutdown::new();

        drop(remote);
        let result = tokio::time::timeout(
            WAIT,
            relay(&mut source, &mut sink, proxy_side, &[], None, 64, &teardown),
        )
        .await
        .expect("relay should end when outbound closes");

        assert!(result.is_ok());
        assert!(client.is_closed());
        assert!(teardown.is_triggered());
        assert!(client.drain().is_empty());
    }

    #[tokio::test]
    async fn inbound_eof_tears_down_outbound() {
        let (mut source, mut sink, mut client) = testing::channel();
        let (proxy_side, mut remote) = duplex(1024);
        let teardown = Shutdown::new();

        client.hang_up();
        tokio::time::timeout(
            WAIT,
            relay(&mut source, &mut sink, proxy_side, &[], None, 64, &teardown),
        )
        .await
        .expect("relay should end when inbound closes")
        .unwrap();

        let mut rest = Vec::new();
        let n = tokio::time::timeout(WAIT, remote.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn inbound_error_is_relay_failure() {
        let (mut source, mut sink, client) = testing::channel();
        let (proxy_side, _remote) = duplex(1024);
        let teardown = Shutdown::new();

        client.fail(io::ErrorKind::ConnectionReset);
        let err = tokio::time::timeout(
            WAIT,
            relay(&mut source, &mut sink, proxy_side, &[], None, 64, &teardown),
        )
        .await
        .unwrap()
        .unwrap_err();

        assert!(matches!(err, TunnelError::RelayIo { leg: Leg::Upstream, .. }));
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn closed_inbound_drops_downstream_chunks() {
        let (mut source, mut sink, client) = testing::channel();
        let (proxy_side, mut remote) = duplex(1024);
        let teardown = Shutdown::new();

        client.open.store(false, std::sync::atomic::Ordering::SeqCst);
        remote.write_all(b"late").await.unwrap();

        let result = tokio::time::timeout(
            WAIT,
            relay(&mut source, &mut sink, proxy_side, &[], None, 64, &teardown),
        )
        .await
        .expect("relay should stop once inbound is gone");

        assert_eq!(result.unwrap().downstream_bytes, 0);
    }

    #[tokio::test]
    async fn destination_speaking_first_does_not_block_leading_payload() {
        let (mut source, mut sink, mut client) = testing::channel();
        let (proxy_side, mut remote) = duplex(64);
        let teardown = Shutdown::new();

        // Fills the 64-byte pipe before reading anything.
        let destination = tokio::spawn(async move {
            remote.write_all(&[7u8; 1024]).await.unwrap();
            let mut received = vec![0u8; 1024];
            remote.read_exact(&mut received).await.unwrap();
            received
        });

        let relay = tokio::spawn(async move {
            relay(&mut source, &mut sink, proxy_side, &[1u8; 1024], None, 64, &teardown).await
        });

        let received = tokio::time::timeout(WAIT, destination).await.unwrap().unwrap();
        assert!(received.iter().all(|b| *b == 1));

        let stats = tokio::time::timeout(WAIT, relay).await.unwrap().unwrap().unwrap();
        assert_eq!(stats.upstream_bytes, 1024);
        assert_eq!(stats.downstream_bytes, 1024);
        assert_eq!(client.drain(), vec![7u8; 1024]);
    }

    #[tokio::test]
    async fn teardown_interrupts_stalled_leading_payload() {
        let (mut source, mut sink, client) = testing::channel();
        let (proxy_side, _remote) = duplex(64);
        let teardown = Shutdown::new();

        let trigger = teardown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.trigger();
        });

        let stats = tokio::time::timeout(
            WAIT,
            relay(&mut source, &mut sink, proxy_side, &[1u8; 1024], None, 64, &teardown),
        )
        .await
        .expect("teardown should interrupt the payload write")
        .unwrap();

        assert_eq!(stats.upstream_bytes, 0);
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn hang_up_interrupts_stalled_leading_payload() {
        let (mut source, mut sink, mut client) = testing::channel();
        let (proxy_side, _remote) = duplex(64);
        let teardown = Shutdown::new();

        client.hang_up();
        tokio::time::timeout(
            WAIT,
            relay(&mut source, &mut sink, proxy_side, &[1u8; 1024], None, 64, &teardown),
        )
        .await
        .expect("client hang-up should end the relay")
        .unwrap();

        assert!(teardown.is_triggered());
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn chunk_during_leading_payload_follows_it() {
        let (mut source, mut sink, client) = testing::channel();
        let (proxy_side, mut remote) = duplex(64);
        let teardown = Shutdown::new();

        client.send(&[9, 9]);
        let relay = tokio::spawn(async move {
            relay(&mut source, &mut sink, proxy_side, &[1u8; 100], None, 64, &teardown).await
        });

        let mut buf = [0u8; 102];
        tokio::time::timeout(WAIT, remote.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(buf[..100].iter().all(|b| *b == 1));
        assert_eq!(&buf[100..], &[9, 9]);

        drop(remote);
        let stats = tokio::time::timeout(WAIT, relay).await.unwrap().unwrap().unwrap();
        assert_eq!(stats.upstream_bytes, 102);
        drop(client);
    }

    #[tokio::test]
    async fn external_teardown_stops_both_legs() {
        let (mut source, mut sink, client) = testing::channel();
        let (proxy_side, _remote) = duplex(1024);
        let teardown = Shutdown::new();

        let trigger = teardown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.trigger();
        });

        tokio::time::timeout(
            WAIT,
            relay(&mut source, &mut sink, proxy_side, &[], None, 64, &teardown),
        )
        .await
        .expect("teardown should stop the relay")
        .unwrap();
        assert!(client.is_closed());
    }
}
