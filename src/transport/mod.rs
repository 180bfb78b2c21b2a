//! Transport layer.
//!
//! This module owns the single duplex channel between the bridge and the
//! host: how it is established, how frames are written and read, and the
//! lifecycle state machine around it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                              ┌─────────────────┐
//! │  Bridge (Rust)   │      stdio / WebSocket       │  Host process   │
//! │                  │                              │                 │
//! │  ChannelManager  │◄────────────────────────────►│  analysis       │
//! │  → Connection    │   length-prefixed JSON       │  backend        │
//! └──────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ChannelManager::ensure_open` - Closed → Connecting, one attempt in flight
//! 2. `Transport::connect` - Spawn or dial the host, producing a [`Link`]
//! 3. `Connection` - Event loop task writes requests, forwards inbound frames
//! 4. Link ends (EOF, error, close) → Closed, pending requests failed
//! 5. Next `ensure_open` starts a fresh attempt
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | Channel state machine and lazy (re)connection |
//! | `connection` | Per-link event loop |
//! | `framing` | Native messaging length-prefixed frames |
//! | `memory` | In-process duplex transport with a scriptable host end |
//! | `process` | Native host child process over stdio |
//! | `websocket` | WebSocket client transport |

// ============================================================================
// Submodules
// ============================================================================

/// Channel state machine.
pub mod channel;

/// Per-link event loop.
pub mod connection;

/// Length-prefixed frame codec.
pub mod framing;

/// In-memory transport.
pub mod memory;

/// Native host child process transport.
pub mod process;

/// WebSocket client transport.
pub mod websocket;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, Stream};

use crate::error::{Error, Result};

use process::ProcessGuard;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{ChannelManager, ChannelObserver, ChannelState};
pub use connection::Connection;
pub use memory::{HostAcceptor, HostEnd, MemoryTransport};
pub use process::ProcessTransport;
pub use websocket::WebSocketTransport;

// ============================================================================
// Types
// ============================================================================

/// Outbound half of a link: accepts one text frame per item.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Inbound half of a link: yields one text frame per item.
///
/// The stream ends (`None`) when the peer closes the channel. An `Err`
/// item is terminal.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

// ============================================================================
// Transport
// ============================================================================

/// Establishes the physical channel to the host.
///
/// Called once per connection attempt. Implementations must not retry
/// internally; the channel manager decides when to reconnect.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens a new link to the host.
    ///
    /// # Errors
    ///
    /// Any error is reported to requesters as a connection failure.
    async fn connect(&self) -> Result<Link>;

    /// Short human-readable description used in logs.
    fn describe(&self) -> String;
}

// ============================================================================
// Link
// ============================================================================

/// An established duplex link produced by a [`Transport`].
pub struct Link {
    pub(crate) sink: FrameSink,
    pub(crate) stream: FrameStream,
    pub(crate) process: Option<ProcessGuard>,
    pub(crate) peer: String,
}

impl Link {
    /// Creates a link from its outbound and inbound halves.
    #[must_use]
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self {
            sink,
            stream,
            process: None,
            peer: String::from("host"),
        }
    }

    /// Sets the peer description used in logs.
    #[must_use]
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = peer.into();
        self
    }

    /// Attaches the child process that backs this link.
    #[must_use]
    pub(crate) fn with_process(mut self, process: ProcessGuard) -> Self {
        self.process = Some(process);
        self
    }

    /// Returns the peer description.
    #[inline]
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("peer", &self.peer)
            .field("process", &self.process.as_ref().map(ProcessGuard::pid))
            .finish_non_exhaustive()
    }
}
