//! Builder pattern for bridge configuration.
//!
//! Provides a fluent API for choosing how the host is reached and for
//! tuning the bridge.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use native_host_bridge::Bridge;
//!
//! # fn example() -> native_host_bridge::Result<()> {
//! let bridge = Bridge::builder()
//!     .host_name("com.dynamics.helper.native")
//!     .origin("chrome-extension://aiimcjfjmibedicmckpphgbddankgdln/")
//!     .request_timeout(Duration::from_secs(120))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::host::{DEFAULT_HOST_NAME, HostLocator, validate_host_name};
use crate::transport::{ProcessTransport, Transport, WebSocketTransport};

use super::core::Bridge;
use super::options::BridgeOptions;

// ============================================================================
// HostTarget
// ============================================================================

/// How the bridge reaches the host.
#[derive(Clone)]
pub enum HostTarget {
    /// Spawn the native host registered under this name.
    Native(String),
    /// Spawn the native host described by this manifest file.
    Manifest(PathBuf),
    /// Dial a host daemon at this `ws://` or `wss://` URL.
    WebSocket(String),
    /// Use a caller-provided transport.
    Custom(Arc<dyn Transport>),
}

impl fmt::Debug for HostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(name) => f.debug_tuple("Native").field(name).finish(),
            Self::Manifest(path) => f.debug_tuple("Manifest").field(path).finish(),
            Self::WebSocket(url) => f.debug_tuple("WebSocket").field(url).finish(),
            Self::Custom(transport) => f.debug_tuple("Custom").field(&transport.describe()).finish(),
        }
    }
}

impl Default for HostTarget {
    fn default() -> Self {
        Self::Native(DEFAULT_HOST_NAME.to_string())
    }
}

// ============================================================================
// BridgeBuilder
// ============================================================================

/// Builder for configuring a [`Bridge`] instance.
///
/// Use [`Bridge::builder()`] to create a new builder. Without further
/// configuration it spawns the native host named
/// [`DEFAULT_HOST_NAME`].
#[derive(Debug, Default, Clone)]
pub struct BridgeBuilder {
    /// How to reach the host.
    target: HostTarget,
    /// Caller origin passed to a spawned host.
    origin: Option<String>,
    /// Extra manifest directories searched first.
    manifest_dirs: Vec<PathBuf>,
    /// Runtime options.
    options: BridgeOptions,
}

// ============================================================================
// BridgeBuilder Implementation
// ============================================================================

impl BridgeBuilder {
    /// Creates a builder targeting the default native host.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the native host registered under `name`.
    #[inline]
    #[must_use]
    pub fn host_name(mut self, name: impl Into<String>) -> Self {
        self.target = HostTarget::Native(name.into());
        self
    }

    /// Spawns the native host described by the manifest at `path`.
    #[inline]
    #[must_use]
    pub fn manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.target = HostTarget::Manifest(path.into());
        self
    }

    /// Adds a directory searched for `<name>.json` before the browser
    /// defaults.
    #[inline]
    #[must_use]
    pub fn manifest_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.manifest_dirs.push(dir.into());
        self
    }

    /// Connects to a host daemon over WebSocket.
    #[inline]
    #[must_use]
    pub fn websocket(mut self, url: impl Into<String>) -> Self {
        self.target = HostTarget::WebSocket(url.into());
        self
    }

    /// Uses a caller-provided transport.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.target = HostTarget::Custom(transport);
        self
    }

    /// Sets the caller origin, checked against the manifest's
    /// `allowed_origins` and passed to the host as its first argument.
    #[inline]
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Replaces all runtime options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Fails requests the host has not answered within `timeout`.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.options.request_timeout = Some(timeout);
        self
    }

    /// Sets the connection attempt limit.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = Some(timeout);
        self
    }

    /// Sets the maximum number of outstanding requests.
    #[inline]
    #[must_use]
    pub fn max_pending(mut self, max_pending: usize) -> Self {
        self.options.max_pending = max_pending;
        self
    }

    /// Sets the inbound frame size limit.
    #[inline]
    #[must_use]
    pub fn max_message_size(mut self, max_message_size: usize) -> Self {
        self.options.max_message_size = max_message_size;
        self
    }

    /// Builds the bridge with validation.
    ///
    /// Nothing is spawned or dialed yet; a missing host surfaces as a
    /// connection error on the first request.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if an option is invalid
    /// - [`Error::Config`] if the WebSocket URL is invalid
    /// - [`Error::Manifest`] if the host name breaks the naming rules
    pub fn build(self) -> Result<Bridge> {
        self.options.validate()?;
        let transport = self.build_transport()?;
        Ok(Bridge::new(transport, self.options))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BridgeBuilder {
    /// Creates the transport for the configured target.
    fn build_transport(&self) -> Result<Arc<dyn Transport>> {
        match &self.target {
            HostTarget::Native(name) => {
                validate_host_name(name)?;
                let locator = HostLocator::new(name.clone()).with_search_dirs(self.manifest_dirs.clone());
                Ok(Arc::new(self.process_transport(locator)))
            }

            HostTarget::Manifest(path) => {
                if path.as_os_str().is_empty() {
                    return Err(Error::config("manifest path is empty"));
                }
                Ok(Arc::new(self.process_transport(HostLocator::from_manifest(path.clone()))))
            }

            HostTarget::WebSocket(url) => {
                self.reject_origin("WebSocket")?;
                let transport = WebSocketTransport::new(url)?.with_max_message_size(self.options.max_message_size);
                Ok(Arc::new(transport))
            }

            HostTarget::Custom(transport) => {
                self.reject_origin("custom")?;
                Ok(Arc::clone(transport))
            }
        }
    }

    /// Builds a process transport with the shared settings applied.
    fn process_transport(&self, locator: HostLocator) -> ProcessTransport {
        let transport = ProcessTransport::new(locator).with_max_message_size(self.options.max_message_size);
        match &self.origin {
            Some(origin) => transport.with_origin(origin.clone()),
            None => transport,
        }
    }

    /// An origin only means something to a spawned native host.
    fn reject_origin(&self, kind: &str) -> Result<()> {
        if self.origin.is_some() {
            return Err(Error::config(format!(
                "origin() applies to native hosts only, not to a {kind} transport"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::MemoryTransport;

    #[test]
    fn test_default_targets_default_host() {
        let builder = BridgeBuilder::new();
        assert!(matches!(builder.target, HostTarget::Native(ref name) if name == DEFAULT_HOST_NAME));
        assert_eq!(builder.options, BridgeOptions::new());
    }

    #[tokio::test]
    async fn test_build_default_is_lazy() {
        let bridge = BridgeBuilder::new().build().expect("build");
        assert_eq!(bridge.pending_count(), 0);
    }

    #[test]
    fn test_invalid_host_name_rejected() {
        let err = BridgeBuilder::new().host_name("Not A Host").build().unwrap_err();
        assert!(matches!(err, Error::Manifest { .. }));
    }

    #[test]
    fn test_invalid_websocket_url_rejected() {
        let err = BridgeBuilder::new().websocket("http://localhost").build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_origin_with_websocket_rejected() {
        let err = BridgeBuilder::new()
            .websocket("ws://127.0.0.1:9000")
            .origin("chrome-extension://abc/")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("native hosts only"));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let err = BridgeBuilder::new().max_pending(0).build().unwrap_err();
        assert!(err.to_string().contains("max_pending"));
    }

    #[tokio::test]
    async fn test_custom_transport_and_options() {
        let (transport, _acceptor) = MemoryTransport::new();
        let bridge = BridgeBuilder::new()
            .transport(Arc::new(transport))
            .request_timeout(Duration::from_secs(3))
            .max_pending(4)
            .build()
            .expect("build");

        assert_eq!(bridge.options().request_timeout, Some(Duration::from_secs(3)));
        assert_eq!(bridge.options().max_pending, 4);
    }

    #[test]
    fn test_later_target_wins() {
        let builder = BridgeBuilder::new()
            .host_name("com.example.first")
            .manifest("/opt/host/manifest.json");
        assert!(matches!(builder.target, HostTarget::Manifest(_)));
    }

    #[test]
    fn test_builder_is_clone() {
        let builder = BridgeBuilder::new().origin("chrome-extension://abc/");
        let cloned = builder.clone();
        assert_eq!(builder.origin, cloned.origin);
    }
}
