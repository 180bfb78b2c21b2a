//! Handler registrations.
//!
//! [`Bridge::on_progress`](super::Bridge::on_progress) and
//! [`Bridge::on_broadcast`](super::Bridge::on_broadcast) return a
//! [`Subscription`]. The handler stays registered until
//! [`Subscription::unsubscribe`] is called; dropping the handle does not
//! remove it. Progress handlers are also removed automatically once their
//! request settles.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Weak;

use crate::identifiers::{RequestId, SubscriptionId};

use super::dispatcher::Dispatcher;

// ============================================================================
// Topic
// ============================================================================

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Progress events of one request.
    Progress(RequestId),
    /// Broadcasts of one kind.
    Broadcast(String),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progress(id) => write!(f, "progress:{id}"),
            Self::Broadcast(kind) => write!(f, "broadcast:{kind}"),
        }
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle to a registered handler.
#[must_use = "the handler stays registered until unsubscribe() is called"]
pub struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    dispatcher: Weak<Dispatcher>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, topic: Topic, dispatcher: Weak<Dispatcher>) -> Self {
        Self {
            id,
            topic,
            dispatcher,
        }
    }

    /// Returns the subscription ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns what the subscription listens to.
    #[inline]
    #[must_use]
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Returns `true` while the handler is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.dispatcher.upgrade().is_some_and(|dispatcher| {
            dispatcher.has_subscription(self.id, &self.topic)
        })
    }

    /// Removes the handler.
    ///
    /// Returns `false` if it was already gone: its request settled, the
    /// channel was lost, or the bridge was dropped.
    pub fn unsubscribe(self) -> bool {
        self.remove()
    }

    fn remove(&self) -> bool {
        self.dispatcher
            .upgrade()
            .is_some_and(|dispatcher| dispatcher.unsubscribe(self.id, &self.topic))
    }
}

// ============================================================================
// SubscriptionSet
// ============================================================================

/// Subscriptions removed together when the set is dropped.
#[derive(Debug, Default)]
pub(crate) struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub(crate) fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    pub(crate) fn len(&self) -> usize {
        self.subscriptions.len()
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        for subscription in &self.subscriptions {
            subscription.remove();
        }
    }
}
