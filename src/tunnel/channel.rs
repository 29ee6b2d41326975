//! Inbound channel abstraction.
//!
//! The upgrade layer hands the tunnel a duplex chunk channel split into a
//! readable half and a writable half. The tunnel never sees WebSocket frames.

use axum::body::Bytes;
use std::future::Future;
use std::io;

/// Readable half of the inbound channel.
pub trait ChunkSource: Send {
    /// Next chunk in arrival order. `None` is end-of-stream.
    fn recv(&mut self) -> impl Future<Output = Option<io::Result<Bytes>>> + Send;
}

/// Writable half of the inbound channel.
pub trait ChunkSink: Send {
    /// Deliver one chunk to the client.
    fn send(&mut self, chunk: Bytes) -> impl Future<Output = io::Result<()>> + Send;

    /// Close the channel. Closing an already closed channel is a no-op.
    fn close(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// Whether the channel can still accept chunks.
    fn is_open(&self) -> bool;
}
