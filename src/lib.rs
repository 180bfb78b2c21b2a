//! Native host bridge - multiplexed requests to a native messaging host.
//!
//! This library runs one duplex channel to a long-lived helper process
//! (the *host*) and lets many logical requests share it concurrently.
//!
//! # Architecture
//!
//! The bridge follows a client-host model:
//!
//! - **Bridge (Rust)**: Sends requests, receives finals and events
//! - **Host**: A native messaging executable (or WebSocket daemon) that
//!   answers requests, streams progress and broadcasts notices
//!
//! Key design principles:
//!
//! - One channel per [`Bridge`], opened lazily and reopened after loss
//! - Every request settles exactly once: answer, host error, or channel loss
//! - Progress events never settle a request; only its final message does
//! - Broadcasts fan out to every subscriber of their kind
//!
//! # Quick Start
//!
//! ```no_run
//! use native_host_bridge::{AnalyzeErrorParams, Bridge, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Spawns com.dynamics.helper.native on the first request
//!     let bridge = Bridge::builder()
//!         .origin("chrome-extension://aiimcjfjmibedicmckpphgbddankgdln/")
//!         .build()?;
//!
//!     let pong = bridge.ping().await?;
//!     println!("host replied {pong}");
//!
//!     let analysis = bridge
//!         .analyze_error_with_progress(AnalyzeErrorParams::new("NullReferenceException"), |step| {
//!             println!("progress: {step}");
//!         })
//!         .await?;
//!     println!("{}", analysis.markdown);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | [`Bridge`], builder, correlator and dispatcher |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | Host manifest parsing and discovery |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire envelopes and host actions |
//! | [`transport`] | Channel state machine and transports |

// ============================================================================
// Modules
// ============================================================================

/// Request multiplexing over the host channel.
///
/// Use [`Bridge::builder()`] to create a configured bridge.
pub mod bridge;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Native host manifest discovery.
pub mod host;

/// Type-safe identifiers for requests and subscriptions.
pub mod identifiers;

/// Wire envelopes and host actions.
pub mod protocol;

/// Channel lifecycle and transports.
///
/// Native host stdio, WebSocket, and an in-memory transport for tests.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{
    Bridge, BridgeBuilder, BridgeOptions, Call, HostTarget, ProgressStream, Subscription, Topic,
};

// Error types
pub use error::{Error, Result};

// Host types
pub use host::{DEFAULT_HOST_NAME, HostLocator, HostManifest};

// Identifier types
pub use identifiers::{RequestId, SubscriptionId};

// Protocol types
pub use protocol::{
    Action, Analysis, AnalyzeErrorParams, ConfigUpdate, ConfigUpdateOutcome, HealthReport,
};

// Transport types
pub use transport::{
    ChannelState, HostAcceptor, HostEnd, Link, MemoryTransport, ProcessTransport, Transport,
    WebSocketTransport,
};
