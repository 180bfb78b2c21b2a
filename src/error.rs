//! Error types for the native host bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use native_host_bridge::{Bridge, Error, Result};
//!
//! async fn example(bridge: &Bridge) -> Result<()> {
//!     match bridge.request("ping", serde_json::json!({})).await {
//!         Ok(reply) => println!("host said {reply}"),
//!         Err(Error::Host { message, .. }) => eprintln!("host refused: {message}"),
//!         Err(e) if e.is_connection_error() => eprintln!("host unreachable: {e}"),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::Manifest`], [`Error::HostNotFound`] |
//! | Channel | [`Error::Connection`], [`Error::ChannelNotOpen`], [`Error::HostDisconnected`] |
//! | Host | [`Error::Host`] |
//! | Protocol | [`Error::MalformedMessage`], [`Error::MessageTooLarge`], [`Error::Protocol`] |
//! | Execution | [`Error::RequestTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when bridge configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Host manifest is unreadable or invalid.
    #[error("Manifest error: {message}")]
    Manifest {
        /// Description of the manifest problem.
        message: String,
    },

    /// No manifest registered for the host name.
    #[error("Native host not found: {name}")]
    HostNotFound {
        /// Logical host name that was looked up.
        name: String,
    },

    // ========================================================================
    // Channel Errors
    // ========================================================================
    /// The channel to the host could not be established.
    ///
    /// Returned by the request that triggered the connection attempt.
    /// No pending request is left registered.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// A send was attempted while the channel was not open.
    ///
    /// Internal guard; callers go through `ensure_open` first.
    #[error("Channel not open")]
    ChannelNotOpen,

    /// The channel closed while the request was outstanding.
    #[error("Host disconnected: {reason}")]
    HostDisconnected {
        /// Close reason reported by the transport.
        reason: String,
    },

    // ========================================================================
    // Host Errors
    // ========================================================================
    /// The host answered the request with an error status.
    #[error("Host error: {message}")]
    Host {
        /// Human-readable message supplied by the host.
        message: String,
        /// Machine-readable error code, when the host sent one separately.
        code: Option<String>,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Inbound envelope could not be classified.
    ///
    /// Only ever logged; never delivered to a caller.
    #[error("Malformed message: {message}")]
    MalformedMessage {
        /// Why the envelope was rejected.
        message: String,
    },

    /// A frame exceeded the configured size limit.
    #[error("Message of {size} bytes exceeds limit of {max} bytes")]
    MessageTooLarge {
        /// Frame size in bytes.
        size: usize,
        /// Configured limit in bytes.
        max: usize,
    },

    /// Protocol violation or capacity limit.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Request timeout.
    ///
    /// Only produced when a per-request timeout is configured.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a manifest error.
    #[inline]
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }

    /// Creates a host not found error.
    #[inline]
    pub fn host_not_found(name: impl Into<String>) -> Self {
        Self::HostNotFound { name: name.into() }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a host disconnected error.
    #[inline]
    pub fn host_disconnected(reason: impl Into<String>) -> Self {
        Self::HostDisconnected {
            reason: reason.into(),
        }
    }

    /// Creates a host error without a separate code.
    #[inline]
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
            code: None,
        }
    }

    /// Creates a host error carrying the host's error code.
    #[inline]
    pub fn host_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Creates a malformed message error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
        }
    }

    /// Creates a message too large error.
    #[inline]
    pub fn message_too_large(size: usize, max: usize) -> Self {
        Self::MessageTooLarge { size, max }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if the host explicitly answered with an error.
    #[inline]
    #[must_use]
    pub fn is_host_error(&self) -> bool {
        matches!(self, Self::Host { .. })
    }

    /// Returns `true` if this is a channel-level error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ChannelNotOpen
                | Self::HostDisconnected { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry: the bridge reconnects
    /// lazily on the next request.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::HostDisconnected { .. }
                | Self::RequestTimeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
