//! Bridge coordinator.
//!
//! The [`Bridge`] multiplexes concurrent requests over one channel to the
//! host, routes progress and broadcast events to subscribers, and
//! reconnects lazily after the channel is lost.
//!
//! # Example
//!
//! ```no_run
//! use native_host_bridge::Bridge;
//!
//! # async fn example() -> native_host_bridge::Result<()> {
//! let bridge = Bridge::builder().build()?;
//!
//! let update = bridge.on_broadcast("update_available", |payload| {
//!     println!("host update available: {payload}");
//! });
//!
//! let reply = bridge.request("ping", serde_json::json!({})).await?;
//! println!("host replied {reply}");
//!
//! update.unsubscribe();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::Result;
use crate::identifiers::RequestId;
use crate::protocol::Request;
use crate::transport::{ChannelManager, ChannelState, Transport};

use super::builder::BridgeBuilder;
use super::call::Call;
use super::correlator::Correlator;
use super::dispatcher::{Dispatcher, Handler};
use super::options::BridgeOptions;
use super::subscription::{Subscription, Topic};

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the bridge.
pub(crate) struct BridgeInner {
    /// Runtime options.
    pub options: BridgeOptions,

    /// The single channel to the host.
    pub channel: ChannelManager,

    /// Pending requests.
    pub correlator: Arc<Correlator>,

    /// Inbound routing and subscriber lists.
    pub dispatcher: Arc<Dispatcher>,
}

// ============================================================================
// Bridge
// ============================================================================

/// Client side of the host channel.
///
/// Cheap to clone; clones share the channel, pending requests and
/// subscriptions. The channel closes when the last clone is dropped.
#[derive(Clone)]
pub struct Bridge {
    /// Shared inner state.
    pub(crate) inner: Arc<BridgeInner>,
}

// ============================================================================
// Bridge - Display
// ============================================================================

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .field("options", &self.inner.options)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Bridge - Public API
// ============================================================================

impl Bridge {
    /// Creates a configuration builder for the bridge.
    #[inline]
    #[must_use]
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Creates a bridge over `transport`. Nothing connects until the first
    /// request or [`connect`](Self::connect).
    ///
    /// `max_message_size` only applies to transports built by
    /// [`BridgeBuilder`]; a custom transport enforces its own limit.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, options: BridgeOptions) -> Self {
        let correlator = Arc::new(Correlator::new(options.max_pending));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&correlator)));
        let channel = ChannelManager::new(transport, dispatcher.clone(), options.connect_timeout);

        debug!(?options, "Bridge created");

        Self {
            inner: Arc::new(BridgeInner {
                options,
                channel,
                correlator,
                dispatcher,
            }),
        }
    }

    /// Sends a request and waits for the host's final answer.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`](crate::Error::Connection) if the host could not be reached
    /// - [`Error::Host`](crate::Error::Host) if the host answered with an error
    /// - [`Error::HostDisconnected`](crate::Error::HostDisconnected) if the channel closed first
    /// - [`Error::RequestTimeout`](crate::Error::RequestTimeout) if a request timeout is set and elapsed
    /// - [`Error::Protocol`](crate::Error::Protocol) if too many requests are pending
    pub async fn request(&self, action: impl Into<String>, payload: Value) -> Result<Value> {
        self.call(action, payload).send().await
    }

    /// Prepares a request so handlers can be attached before it is sent.
    pub fn call(&self, action: impl Into<String>, payload: Value) -> Call<'_> {
        let id = self.inner.correlator.next_id();
        Call::new(self, Request::with_id(id, action, payload))
    }

    /// Calls `handler` with the data of every progress event for `id`.
    ///
    /// Events only arrive while `id` is pending. Prefer [`Call::on_progress`]
    /// for requests this bridge sends, since it attaches before sending.
    pub fn on_progress<F>(&self, id: RequestId, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe_progress(id, Arc::new(handler))
    }

    /// Calls `handler` with the payload of every broadcast of `kind`.
    pub fn on_broadcast<F>(&self, kind: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let kind = kind.into();
        let id = self
            .inner
            .dispatcher
            .subscribe_broadcast(kind.clone(), Arc::new(handler));
        Subscription::new(id, Topic::Broadcast(kind), Arc::downgrade(&self.inner.dispatcher))
    }

    /// Opens the channel now instead of on the first request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`](crate::Error::Connection) if the host could not be reached.
    pub async fn connect(&self) -> Result<()> {
        self.inner.channel.ensure_open().await
    }

    /// Closes the channel and fails all pending requests.
    ///
    /// The bridge stays usable; the next request reconnects.
    pub fn close(&self) {
        info!(pending = self.pending_count(), "Closing bridge");
        self.inner.channel.close();
    }

    /// Returns the channel state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.inner.channel.state()
    }

    /// Returns a receiver that observes channel state changes.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.channel.watch_state()
    }

    /// Returns the number of requests waiting for an answer.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// Returns the runtime options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &BridgeOptions {
        &self.inner.options
    }
}

// ============================================================================
// Bridge - Internal
// ============================================================================

impl Bridge {
    /// Submits a prepared request through the correlator.
    ///
    /// Progress handlers for the request are released when this returns or
    /// is dropped, including on timeout and abandonment.
    pub(crate) async fn submit(&self, request: Request) -> Result<Value> {
        let _progress = ProgressCleanup {
            dispatcher: &self.inner.dispatcher,
            id: request.id,
        };
        self.inner
            .correlator
            .submit(&self.inner.channel, request, self.inner.options.request_timeout)
            .await
    }

    /// Registers a progress handler and wraps it in a subscription.
    pub(crate) fn subscribe_progress(&self, id: RequestId, handler: Handler) -> Subscription {
        let subscription = self.inner.dispatcher.subscribe_progress(id, handler);
        Subscription::new(subscription, Topic::Progress(id), Arc::downgrade(&self.inner.dispatcher))
    }
}

// ============================================================================
// ProgressCleanup
// ============================================================================

/// Releases a request's progress handlers on drop.
struct ProgressCleanup<'a> {
    dispatcher: &'a Dispatcher,
    id: RequestId,
}

impl Drop for ProgressCleanup<'_> {
    fn drop(&mut self) {
        self.dispatcher.forget(self.id);
    }
}

// ============================================================================
// Tests
// ============================================================================
