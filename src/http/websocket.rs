//! WebSocket transport for tunnel sessions.
//!
//! # Responsibilities
//! - Split an upgraded socket into a `ChunkSource` and a `ChunkSink`
//! - Decode early data carried in `Sec-WebSocket-Protocol`
//! - Track whether the client side is still open
//!
//! # Data Flow
//! ```text
//! Client ──binary frames──▶ WsSource ──chunks──▶ session
//! Client ◀──binary frames── WsSink ◀──chunks── session
//! ```
//!
//! # Design Decisions
//! - Frame payloads are passed through as-is (no message buffering)
//! - Text frames are ignored; ping/pong handled by the WebSocket layer
//! - Close is idempotent

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::tunnel::{ChunkSink, ChunkSource};

/// Early data could not be decoded.
#[derive(Debug, Error)]
#[error("invalid early data: {0}")]
pub struct EarlyDataError(#[from] base64::DecodeError);

/// Decode a `Sec-WebSocket-Protocol` value carrying early data.
///
/// URL-safe base64; standard-alphabet characters and padding are tolerated.
/// Blank or empty-decoding values yield `None`.
pub fn decode_early_data(value: &str) -> Result<Option<Bytes>, EarlyDataError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let normalized: String = value
        .chars()
        .filter(|c| *c != '=')
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();

    let decoded = URL_SAFE_NO_PAD.decode(normalized)?;
    Ok((!decoded.is_empty()).then(|| Bytes::from(decoded)))
}

/// Split an upgraded socket into tunnel halves. `early_data`, if any, is
/// returned by the source before the first frame.
pub fn split_socket(socket: WebSocket, early_data: Option<Bytes>) -> (WsSource, WsSink) {
    let (sink, stream) = socket.split();
    let open = Arc::new(AtomicBool::new(true));

    (
        WsSource {
            inner: stream,
            early_data,
            open: Arc::clone(&open),
        },
        WsSink {
            inner: sink,
            open,
            closed: false,
        },
    )
}

/// Readable half of a tunnel WebSocket.
pub struct WsSource {
    inner: SplitStream<WebSocket>,
    early_data: Option<Bytes>,
    open: Arc<AtomicBool>,
}

impl ChunkSource for WsSource {
    async fn recv(&mut self) -> Option<io::Result<Bytes>> {
        if let Some(data) = self.early_data.take() {
            return Some(Ok(data));
        }

        loop {
            match self.inner.next().await {
                Some(Ok(Message::Binary(data))) => return Some(Ok(data)),
                Some(Ok(Message::Text(_))) => tracing::debug!("Ignoring text frame"),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    self.open.store(false, Ordering::SeqCst);
                    return None;
                }
                Some(Err(e)) => {
                    self.open.store(false, Ordering::SeqCst);
                    return Some(Err(io::Error::other(e)));
                }
            }
        }
    }
}

/// Writable half of a tunnel WebSocket.
pub struct WsSink {
    inner: SplitSink<WebSocket, Message>,
    open: Arc<AtomicBool>,
    closed: bool,
}

impl ChunkSink for WsSink {
    async fn send(&mut self, chunk: Bytes) -> io::Result<()> {
        if !self.is_open() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "websocket closed"));
        }
        if let Err(e) = self.inner.send(Message::Binary(chunk)).await {
            self.open.store(false, Ordering::SeqCst);
            return Err(io::Error::other(e));
        }
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.open.store(false, Ordering::SeqCst);
        self.inner.close().await.map_err(io::Error::other)
    }

    fn is_open(&self) -> bool {
        !self.closed && self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_url_safe_early_data() {
        let encoded = URL_SAFE_NO_PAD.encode([0xfb, 0xff, 0x01]);
        assert_eq!(encoded, "-_8B");
        let decoded = decode_early_data(&encoded).unwrap().unwrap();
        assert_eq!(&decoded[..], &[0xfb, 0xff, 0x01]);
    }

    #[test]
    fn tolerates_standard_alphabet_and_padding() {
        let decoded = decode_early_data("+/8B").unwrap().unwrap();
        assert_eq!(&decoded[..], &[0xfb, 0xff, 0x01]);

        let decoded = decode_early_data("aGk=").unwrap().unwrap();
        assert_eq!(&decoded[..], b"hi");
    }

    #[test]
    fn blank_is_none() {
        assert!(decode_early_data("").unwrap().is_none());
        assert!(decode_early_data("   ").unwrap().is_none());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_early_data("not base64!").is_err());
    }
}
