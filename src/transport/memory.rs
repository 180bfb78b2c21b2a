//! In-memory transport.
//!
//! Every successful [`MemoryTransport::connect`] creates a fresh duplex
//! pipe framed exactly like the native host's stdio, and hands the far
//! end to the paired [`HostAcceptor`] as a [`HostEnd`]. Whoever holds the
//! acceptor plays the host: read requests, answer them, stream progress,
//! broadcast, or drop the end to simulate the host going away.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use native_host_bridge::{Bridge, BridgeOptions, MemoryTransport};
//!
//! # async fn example() -> native_host_bridge::Result<()> {
//! let (transport, mut acceptor) = MemoryTransport::new();
//! let bridge = Bridge::new(Arc::new(transport), BridgeOptions::new());
//!
//! tokio::spawn(async move {
//!     let mut host = acceptor.accept().await.expect("connection");
//!     while let Ok(Some(request)) = host.recv().await {
//!         let _ = host.reply(request.id, serde_json::json!("pong")).await;
//!     }
//! });
//!
//! let reply = bridge.request("ping", serde_json::json!({})).await?;
//! assert_eq!(reply, "pong");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{duplex, split};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Broadcast, Progress, Request, Response};

use super::framing::{DEFAULT_MAX_MESSAGE_SIZE, frame_sink, frame_stream};
use super::{FrameSink, FrameStream, Link, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size of each direction of the duplex pipe.
const PIPE_BUFFER_SIZE: usize = 64 * 1024;

// ============================================================================
// MemoryTransport
// ============================================================================

/// Shared state between transport clones.
struct MemoryInner {
    /// Delivers host ends to the acceptor.
    hosts_tx: mpsc::UnboundedSender<HostEnd>,
    /// Queued refusal reasons, consumed one per connection attempt.
    refusals: Mutex<VecDeque<String>>,
    /// Number of connection attempts, including refused ones.
    attempts: AtomicUsize,
}

/// Transport backed by an in-process duplex pipe.
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<MemoryInner>,
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("attempts", &self.attempts())
            .finish_non_exhaustive()
    }
}

impl MemoryTransport {
    /// Creates a transport and the acceptor that receives its host ends.
    #[must_use]
    pub fn new() -> (Self, HostAcceptor) {
        let (hosts_tx, hosts_rx) = mpsc::unbounded_channel();
        let transport = Self {
            inner: Arc::new(MemoryInner {
                hosts_tx,
                refusals: Mutex::new(VecDeque::new()),
                attempts: AtomicUsize::new(0),
            }),
        };
        (transport, HostAcceptor { hosts_rx })
    }

    /// Makes the next connection attempt fail with `reason`.
    ///
    /// Calls queue up: each one refuses exactly one attempt.
    pub fn refuse_next(&self, reason: impl Into<String>) {
        self.inner.refusals.lock().push_back(reason.into());
    }

    /// Returns the number of connection attempts so far.
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<Link> {
        let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(reason) = self.inner.refusals.lock().pop_front() {
            debug!(attempt, %reason, "Memory transport refusing connection");
            return Err(Error::connection(reason));
        }

        let (bridge_io, host_io) = duplex(PIPE_BUFFER_SIZE);
        let (bridge_read, bridge_write) = split(bridge_io);
        let (host_read, host_write) = split(host_io);

        let host = HostEnd {
            sink: frame_sink(host_write),
            stream: frame_stream(host_read, usize::MAX),
            attempt,
        };
        self.inner
            .hosts_tx
            .send(host)
            .map_err(|_| Error::connection("memory host acceptor was dropped"))?;

        debug!(attempt, "Memory transport connected");
        Ok(Link::new(
            frame_sink(bridge_write),
            frame_stream(bridge_read, DEFAULT_MAX_MESSAGE_SIZE),
        )
        .with_peer(format!("memory host #{attempt}")))
    }

    fn describe(&self) -> String {
        String::from("memory host")
    }
}

// ============================================================================
// HostAcceptor
// ============================================================================

/// Receives the host end of every connection made by a [`MemoryTransport`].
pub struct HostAcceptor {
    hosts_rx: mpsc::UnboundedReceiver<HostEnd>,
}

impl HostAcceptor {
    /// Waits for the next connection.
    ///
    /// Returns `None` once every transport clone has been dropped.
    pub async fn accept(&mut self) -> Option<HostEnd> {
        self.hosts_rx.recv().await
    }

    /// Returns an already-established connection without waiting.
    pub fn try_accept(&mut self) -> Option<HostEnd> {
        self.hosts_rx.try_recv().ok()
    }
}

// ============================================================================
// HostEnd
// ============================================================================

/// The host's side of one in-memory connection.
///
/// Dropping it closes the channel, which the bridge observes as the host
/// disconnecting.
pub struct HostEnd {
    sink: FrameSink,
    stream: FrameStream,
    attempt: usize,
}

impl fmt::Debug for HostEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEnd")
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

impl HostEnd {
    /// Which connection attempt produced this end (1-based).
    #[inline]
    #[must_use]
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Reads the next raw frame, or `None` when the bridge closed the channel.
    ///
    /// # Errors
    ///
    /// Returns the framing error if the pipe is corrupted.
    pub async fn recv_raw(&mut self) -> Result<Option<String>> {
        self.stream.next().await.transpose()
    }

    /// Reads and decodes the next request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the frame is not a request.
    pub async fn recv(&mut self) -> Result<Option<Request>> {
        match self.recv_raw().await? {
            Some(frame) => Ok(Some(serde_json::from_str(&frame)?)),
            None => Ok(None),
        }
    }

    /// Sends a raw frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the bridge side is gone.
    pub async fn send_raw(&mut self, frame: impl Into<String>) -> Result<()> {
        self.sink.send(frame.into()).await
    }

    /// Sends a JSON value as one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the bridge side is gone.
    pub async fn send_json(&mut self, value: &Value) -> Result<()> {
        self.send_raw(serde_json::to_string(value)?).await
    }

    /// Answers a request successfully.
    ///
    /// # Errors
    ///
    /// Returns an error if the bridge side is gone.
    pub async fn reply(&mut self, id: RequestId, data: Value) -> Result<()> {
        self.send_json(&Response::success(id, data).to_json()).await
    }

    /// Answers a request with an error status.
    ///
    /// # Errors
    ///
    /// Returns an error if the bridge side is gone.
    pub async fn reply_error(&mut self, id: RequestId, error: impl Into<String>) -> Result<()> {
        self.send_json(&Response::error(id, Some(error.into()), None).to_json())
            .await
    }

    /// Emits a progress event for a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the bridge side is gone.
    pub async fn progress(&mut self, id: RequestId, data: Value) -> Result<()> {
        self.send_json(&Progress::new(id, data).to_json()).await
    }

    /// Emits a broadcast.
    ///
    /// # Errors
    ///
    /// Returns an error if the bridge side is gone.
    pub async fn broadcast(&mut self, kind: impl Into<String>, payload: Value) -> Result<()> {
        self.send_json(&Broadcast::new(kind, payload).to_json()).await
    }

    /// Closes the channel from the host side.
    pub fn close(self) {
        debug!(attempt = self.attempt, "Memory host closing channel");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[tokio::test]
    async fn test_connect_hands_host_end_to_acceptor() {
        let (transport, mut acceptor) = MemoryTransport::new();
        let mut link = transport.connect().await.expect("connect");
        let mut host = acceptor.try_accept().expect("host end");

        assert_eq!(host.attempt(), 1);
        assert_eq!(link.peer(), "memory host #1");

        let request = Request::new("ping", json!({}));
        link.sink.send(request.to_frame().expect("frame")).await.expect("send");
        let received = host.recv().await.expect("read").expect("request");
        assert_eq!(received, request);

        host.reply(request.id, json!("pong")).await.expect("reply");
        let frame = link.stream.next().await.expect("item").expect("frame");
        assert!(frame.contains("pong"));
    }

    #[tokio::test]
    async fn test_refusals_are_consumed_in_order() {
        let (transport, mut acceptor) = MemoryTransport::new();
        transport.refuse_next("host missing");

        let err = transport.connect().await.unwrap_err();
        assert_eq!(err.to_string(), "Connection failed: host missing");
        assert!(acceptor.try_accept().is_none());

        transport.connect().await.expect("second attempt connects");
        assert!(acceptor.try_accept().is_some());
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test]
    async fn test_closing_host_ends_bridge_stream() {
        let (transport, mut acceptor) = MemoryTransport::new();
        let mut link = transport.connect().await.expect("connect");
        acceptor.try_accept().expect("host end").close();

        assert!(link.stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_acceptor_fails_connect() {
        let (transport, acceptor) = MemoryTransport::new();
        drop(acceptor);

        let err = transport.connect().await.unwrap_err();
        assert!(err.is_connection_error());
    }
}
