//! Inbound message routing.
//!
//! Every frame the channel receives is routed to exactly one sink:
//!
//! | Envelope | Sink |
//! |----------|------|
//! | Final | the pending request (via the correlator) |
//! | Progress | progress handlers for its request ID, while still pending |
//! | Broadcast | broadcast handlers for its kind |
//! | Malformed | logged at `warn`, dropped |
//!
//! Handlers run on the channel's event loop task, outside any lock. A
//! panicking handler is caught and logged.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use crate::identifiers::{RequestId, SubscriptionId};
use crate::protocol::Inbound;
use crate::transport::ChannelObserver;

use super::correlator::Correlator;
use super::subscription::Topic;

// ============================================================================
// Types
// ============================================================================

/// Callback for progress data or broadcast payloads.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handlers registered for one key.
type HandlerList = Vec<(SubscriptionId, Handler)>;

// ============================================================================
// Route
// ============================================================================

/// Where an inbound frame ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A final message settled its pending request.
    Settled,
    /// A final or progress message named no pending request.
    Unmatched,
    /// A progress event reached this many handlers.
    Progress {
        /// Handlers called.
        delivered: usize,
    },
    /// A broadcast reached this many handlers.
    Broadcast {
        /// Handlers called.
        delivered: usize,
    },
    /// The frame was malformed.
    Dropped,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes inbound frames and owns the subscriber lists.
pub struct Dispatcher {
    /// Settles final messages.
    correlator: Arc<Correlator>,
    /// Progress handlers by request ID.
    progress: RwLock<FxHashMap<RequestId, HandlerList>>,
    /// Broadcast handlers by kind.
    broadcast: RwLock<FxHashMap<String, HandlerList>>,
    /// Next subscription ID.
    next_subscription: AtomicU64,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("progress_topics", &self.progress.read().len())
            .field("broadcast_topics", &self.broadcast.read().len())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher that settles finals through `correlator`.
    #[must_use]
    pub fn new(correlator: Arc<Correlator>) -> Self {
        Self {
            correlator,
            progress: RwLock::new(FxHashMap::default()),
            broadcast: RwLock::new(FxHashMap::default()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Parses and routes one raw frame. Never fails.
    pub fn dispatch(&self, frame: &str) -> Route {
        match Inbound::parse(frame) {
            Ok(inbound) => self.route(inbound),
            Err(e) => {
                warn!(error = %e, len = frame.len(), "Dropping malformed message");
                Route::Dropped
            }
        }
    }

    /// Routes one classified envelope.
    pub fn route(&self, inbound: Inbound) -> Route {
        match inbound {
            Inbound::Final(response) => {
                let id = response.id;
                let settled = self.correlator.resolve_final(response);
                self.progress.write().remove(&id);

                if settled {
                    Route::Settled
                } else {
                    debug!(request_id = %id, "Ignoring final for unknown request");
                    Route::Unmatched
                }
            }

            Inbound::Progress(progress) => {
                if !self.correlator.is_pending(progress.id) {
                    debug!(request_id = %progress.id, "Ignoring progress for unknown request");
                    return Route::Unmatched;
                }

                let handlers = handlers_for(&self.progress, &progress.id);
                trace!(request_id = %progress.id, handlers = handlers.len(), "Progress received");
                let delivered = invoke(&handlers, &progress.data, "progress");
                Route::Progress { delivered }
            }

            Inbound::Broadcast(broadcast) => {
                let handlers = handlers_for(&self.broadcast, &broadcast.kind);
                if handlers.is_empty() {
                    debug!(kind = %broadcast.kind, "Broadcast with no subscribers");
                }
                let delivered = invoke(&handlers, &broadcast.payload, "broadcast");
                Route::Broadcast { delivered }
            }
        }
    }

    /// Registers a progress handler for `id`.
    pub fn subscribe_progress(&self, id: RequestId, handler: Handler) -> SubscriptionId {
        let subscription = self.allocate();
        self.progress
            .write()
            .entry(id)
            .or_default()
            .push((subscription, handler));
        trace!(request_id = %id, %subscription, "Progress handler registered");
        subscription
    }

    /// Registers a broadcast handler for `kind`.
    pub fn subscribe_broadcast(&self, kind: impl Into<String>, handler: Handler) -> SubscriptionId {
        let kind = kind.into();
        let subscription = self.allocate();
        trace!(%kind, %subscription, "Broadcast handler registered");
        self.broadcast
            .write()
            .entry(kind)
            .or_default()
            .push((subscription, handler));
        subscription
    }

    /// Removes a handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, subscription: SubscriptionId, topic: &Topic) -> bool {
        match topic {
            Topic::Progress(id) => remove_handler(&self.progress, id, subscription),
            Topic::Broadcast(kind) => remove_handler(&self.broadcast, kind, subscription),
        }
    }

    /// Drops every progress handler registered for `id`.
    ///
    /// Called once the request behind `id` is finished, whatever the outcome.
    /// Returns how many handlers were removed.
    pub fn forget(&self, id: RequestId) -> usize {
        let removed = self.progress.write().remove(&id).map_or(0, |list| list.len());
        if removed > 0 {
            trace!(request_id = %id, removed, "Progress handlers released");
        }
        removed
    }

    /// Returns the number of handlers registered for `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        match topic {
            Topic::Progress(id) => self.progress.read().get(id).map_or(0, Vec::len),
            Topic::Broadcast(kind) => self.broadcast.read().get(kind).map_or(0, Vec::len),
        }
    }

    /// Returns `true` if `subscription` is still registered under `topic`.
    #[must_use]
    pub fn has_subscription(&self, subscription: SubscriptionId, topic: &Topic) -> bool {
        let contains = |list: &HandlerList| list.iter().any(|(id, _)| *id == subscription);
        match topic {
            Topic::Progress(id) => self.progress.read().get(id).is_some_and(contains),
            Topic::Broadcast(kind) => self.broadcast.read().get(kind).is_some_and(contains),
        }
    }

    /// Allocates the next subscription ID.
    fn allocate(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_subscription.fetch_add(1, Ordering::Relaxed))
    }
}

impl ChannelObserver for Dispatcher {
    fn on_message(&self, frame: &str) {
        self.dispatch(frame);
    }

    fn on_closed(&self, reason: &str) {
        let failed = self.correlator.fail_all(reason);
        if failed.is_empty() {
            return;
        }

        let mut progress = self.progress.write();
        for id in &failed {
            progress.remove(id);
        }
        info!(count = failed.len(), %reason, "Channel loss rejected pending requests");
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Snapshots the handlers for `key` so they can run without the lock.
fn handlers_for<K>(map: &RwLock<FxHashMap<K, HandlerList>>, key: &K) -> Vec<Handler>
where
    K: std::hash::Hash + Eq,
{
    map.read()
        .get(key)
        .map(|list| list.iter().map(|(_, handler)| Arc::clone(handler)).collect())
        .unwrap_or_default()
}

/// Removes one handler, dropping the key when its list empties.
fn remove_handler<K, Q>(map: &RwLock<FxHashMap<K, HandlerList>>, key: &Q, subscription: SubscriptionId) -> bool
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
{
    let mut map = map.write();
    let Some(list) = map.get_mut(key) else {
        return false;
    };

    let before = list.len();
    list.retain(|(id, _)| *id != subscription);
    let removed = list.len() != before;

    if list.is_empty() {
        map.remove(key);
    }
    removed
}

/// Calls every handler, isolating panics. Returns how many returned normally.
fn invoke(handlers: &[Handler], value: &Value, topic: &'static str) -> usize {
    let mut delivered = 0;
    for handler in handlers {
        match catch_unwind(AssertUnwindSafe(|| handler(value))) {
            Ok(()) => delivered += 1,
            Err(_) => error!(topic, "Subscriber panicked; continuing"),
        }
    }
    delivered
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use serde_json::json;

    use tokio::sync::oneshot;

    use crate::error::{Error, Result};
    use crate::protocol::{Broadcast, Progress, Request, Response};

    fn dispatcher() -> (Dispatcher, Arc<Correlator>) {
        let correlator = Arc::new(Correlator::new(100));
        (Dispatcher::new(Arc::clone(&correlator)), correlator)
    }

    fn recording() -> (Handler, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: Handler = Arc::new(move |value: &Value| sink.lock().push(value.clone()));
        (handler, seen)
    }

    fn pending(correlator: &Correlator) -> (RequestId, oneshot::Receiver<Result<Value>>) {
        let request = Request::with_id(correlator.next_id(), "analyze_error", json!({}));
        let rx = correlator.register(&request).expect("register");
        (request.id, rx)
    }

    #[test]
    fn test_malformed_is_dropped() {
        let (dispatcher, _) = dispatcher();
        assert_eq!(dispatcher.dispatch("not json"), Route::Dropped);
        assert_eq!(dispatcher.dispatch(r#"{"status":"success"}"#), Route::Dropped);
    }

    #[test]
    fn test_broadcast_fans_out_by_kind() {
        let (dispatcher, _) = dispatcher();
        let (first, first_seen) = recording();
        let (second, second_seen) = recording();
        let (other, other_seen) = recording();

        dispatcher.subscribe_broadcast("update_available", first);
        dispatcher.subscribe_broadcast("update_available", second);
        dispatcher.subscribe_broadcast("something_else", other);

        let route = dispatcher.route(Inbound::Broadcast(Broadcast::new(
            "update_available",
            json!({"version": "2.1.0"}),
        )));

        assert_eq!(route, Route::Broadcast { delivered: 2 });
        assert_eq!(first_seen.lock().len(), 1);
        assert_eq!(second_seen.lock()[0]["version"], "2.1.0");
        assert!(other_seen.lock().is_empty());
    }

    #[test]
    fn test_unsubscribe_removes_only_that_handler() {
        let (dispatcher, _) = dispatcher();
        let (first, first_seen) = recording();
        let (second, second_seen) = recording();

        let a = dispatcher.subscribe_broadcast("update_available", first);
        dispatcher.subscribe_broadcast("update_available", second);

        let topic = Topic::Broadcast("update_available".into());
        assert!(dispatcher.unsubscribe(a, &topic));
        assert!(!dispatcher.unsubscribe(a, &topic));
        assert_eq!(dispatcher.subscriber_count(&topic), 1);

        dispatcher.dispatch(r#"{"kind":"update_available","payload":null}"#);
        assert!(first_seen.lock().is_empty());
        assert_eq!(second_seen.lock().len(), 1);
    }

    #[test]
    fn test_progress_for_unknown_request_is_unmatched() {
        let (dispatcher, _) = dispatcher();
        let id = RequestId::generate();
        let (handler, seen) = recording();
        dispatcher.subscribe_progress(id, handler);

        let route = dispatcher.route(Inbound::Progress(Progress::new(id, json!({"step": 1}))));
        assert_eq!(route, Route::Unmatched);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_progress_delivered_in_order_without_settling() {
        let (dispatcher, correlator) = dispatcher();
        let (id, rx) = pending(&correlator);
        let (handler, seen) = recording();
        dispatcher.subscribe_progress(id, handler);

        for step in 1..=2 {
            let route = dispatcher.route(Inbound::Progress(Progress::new(id, json!({"step": step}))));
            assert_eq!(route, Route::Progress { delivered: 1 });
        }
        assert!(correlator.is_pending(id));

        let route = dispatcher.dispatch(&Response::success(id, json!({"markdown": "done"})).to_json().to_string());
        assert_eq!(route, Route::Settled);
        assert_eq!(*seen.lock(), vec![json!({"step": 1}), json!({"step": 2})]);
        assert_eq!(dispatcher.subscriber_count(&Topic::Progress(id)), 0);
        assert_eq!(rx.await.expect("settled").expect("ok")["markdown"], "done");
    }

    #[tokio::test]
    async fn test_channel_loss_fails_pending_and_clears_their_progress() {
        let (dispatcher, correlator) = dispatcher();
        let (id, rx) = pending(&correlator);
        let (handler, _) = recording();
        dispatcher.subscribe_progress(id, handler);

        dispatcher.on_closed("host closed the channel");

        assert_eq!(correlator.pending_count(), 0);
        assert_eq!(dispatcher.subscriber_count(&Topic::Progress(id)), 0);
        let err = rx.await.expect("settled").unwrap_err();
        assert!(matches!(err, Error::HostDisconnected { .. }));
    }

    #[test]
    fn test_final_for_unknown_request_is_unmatched() {
        let (dispatcher, _) = dispatcher();
        let route = dispatcher.route(Inbound::Final(Response::success(RequestId::generate(), json!(1))));
        assert_eq!(route, Route::Unmatched);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let (dispatcher, _) = dispatcher();
        let (good, seen) = recording();
        dispatcher.subscribe_broadcast("update_available", Arc::new(|_: &Value| panic!("boom")));
        dispatcher.subscribe_broadcast("update_available", good);

        let route = dispatcher.dispatch(r#"{"kind":"update_available","payload":{}}"#);
        assert_eq!(route, Route::Broadcast { delivered: 1 });
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_forget_releases_progress_handlers() {
        let (dispatcher, correlator) = dispatcher();
        let (id, _rx) = pending(&correlator);
        let (handler, seen) = recording();
        let subscription = dispatcher.subscribe_progress(id, Arc::clone(&handler));
        dispatcher.subscribe_progress(id, handler);

        assert!(correlator.discard(id));
        assert_eq!(dispatcher.forget(id), 2);
        assert_eq!(dispatcher.forget(id), 0);
        assert!(!dispatcher.has_subscription(subscription, &Topic::Progress(id)));
        assert_eq!(dispatcher.subscriber_count(&Topic::Progress(id)), 0);

        let route = dispatcher.route(Inbound::Progress(Progress::new(id, json!("late"))));
        assert_eq!(route, Route::Unmatched);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        let (dispatcher, _) = dispatcher();
        let (handler, _) = recording();
        let a = dispatcher.subscribe_broadcast("a", Arc::clone(&handler));
        let b = dispatcher.subscribe_progress(RequestId::generate(), handler);
        assert_ne!(a, b);
    }
}
