//! A request prepared but not yet sent.
//!
//! A [`Call`] knows its [`RequestId`] before anything reaches the host,
//! so progress handlers can be attached first and no event is missed.
//!
//! # Example
//!
//! ```no_run
//! use futures_util::StreamExt;
//! use native_host_bridge::Bridge;
//!
//! # async fn example(bridge: &Bridge) -> native_host_bridge::Result<()> {
//! let mut call = bridge.call("analyze_error", serde_json::json!({"text": "NRE"}));
//! let mut progress = call.progress_stream();
//!
//! tokio::spawn(async move {
//!     while let Some(step) = progress.next().await {
//!         println!("progress: {step}");
//!     }
//! });
//!
//! let result = call.send().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::identifiers::RequestId;
use crate::protocol::Request;

use super::core::Bridge;
use super::subscription::SubscriptionSet;

// ============================================================================
// Call
// ============================================================================

/// A request with handlers attached, sent by [`Call::send`].
///
/// Handlers attached through the call are removed when it completes or is
/// dropped.
#[must_use = "a call does nothing until send() is awaited"]
pub struct Call<'a> {
    bridge: &'a Bridge,
    request: Request,
    subscriptions: SubscriptionSet,
}

impl fmt::Debug for Call<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.request.id)
            .field("action", &self.request.action)
            .field("handlers", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}

impl<'a> Call<'a> {
    pub(crate) fn new(bridge: &'a Bridge, request: Request) -> Self {
        Self {
            bridge,
            request,
            subscriptions: SubscriptionSet::default(),
        }
    }

    /// Returns the ID the request will be sent with.
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.request.id
    }

    /// Returns the action name.
    #[inline]
    #[must_use]
    pub fn action(&self) -> &str {
        &self.request.action
    }

    /// Calls `handler` with the data of every progress event, in order.
    pub fn on_progress<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let subscription = self.bridge.subscribe_progress(self.request.id, Arc::new(handler));
        self.subscriptions.push(subscription);
        self
    }

    /// Returns a stream of progress data.
    ///
    /// The stream ends when the call settles.
    pub fn progress_stream(&mut self) -> ProgressStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.bridge.subscribe_progress(
            self.request.id,
            Arc::new(move |data: &Value| {
                let _ = tx.send(data.clone());
            }),
        );
        self.subscriptions.push(subscription);
        ProgressStream { rx }
    }

    /// Sends the request and waits for its final message.
    ///
    /// # Errors
    ///
    /// Same as [`Bridge::request`].
    pub async fn send(self) -> Result<Value> {
        let Self {
            bridge,
            request,
            subscriptions,
        } = self;

        let result = bridge.submit(request).await;
        drop(subscriptions);
        result
    }
}

// ============================================================================
// ProgressStream
// ============================================================================

/// Progress data of one call.
#[derive(Debug)]
pub struct ProgressStream {
    rx: mpsc::UnboundedReceiver<Value>,
}

impl Stream for ProgressStream {
    type Item = Value;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
