//! Channel state machine.
//!
//! The [`ChannelManager`] owns the single link to the host and its
//! lifecycle:
//!
//! ```text
//!          ensure_open()              connect ok
//! Closed ───────────────► Connecting ───────────► Open
//!   ▲                          │                   │
//!   │      connect failed      │                   │ host closed / I/O error / close()
//!   └──────────────────────────┴───────────────────┘
//! ```
//!
//! There is no background retry: a lost channel stays Closed until the
//! next [`ChannelManager::ensure_open`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::Request;

use super::Transport;
use super::connection::{Connection, LinkEvents};

// ============================================================================
// Constants
// ============================================================================

/// Close reason reported for an explicit [`ChannelManager::close`].
const REASON_CLOSED_BY_BRIDGE: &str = "bridge closed";

// ============================================================================
// ChannelState
// ============================================================================

/// Lifecycle state of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// No link; the next request connects.
    Closed,
    /// A connection attempt is in flight.
    Connecting,
    /// The link is up.
    Open,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Open => "open",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ChannelObserver
// ============================================================================

/// Receives inbound traffic and close notifications from the channel.
pub trait ChannelObserver: Send + Sync + 'static {
    /// Called for every inbound frame, unmodified.
    fn on_message(&self, frame: &str);

    /// Called once each time an open channel closes.
    ///
    /// Runs while the channel is already marked Closed and before any new
    /// connection attempt can start.
    fn on_closed(&self, reason: &str);
}

// ============================================================================
// Slot
// ============================================================================

/// Outcome of a connection attempt, shared with every waiter.
type ConnectOutcome = Option<std::result::Result<(), String>>;

/// What the manager currently holds.
enum Slot {
    Closed,
    Connecting {
        generation: u64,
        outcome: watch::Receiver<ConnectOutcome>,
    },
    Open(Connection),
}

impl Slot {
    fn state(&self) -> ChannelState {
        match self {
            Self::Closed => ChannelState::Closed,
            Self::Connecting { .. } => ChannelState::Connecting,
            Self::Open(_) => ChannelState::Open,
        }
    }
}

// ============================================================================
// ChannelManager
// ============================================================================

/// Shared state behind a [`ChannelManager`].
struct ChannelInner {
    /// Establishes links.
    transport: Arc<dyn Transport>,
    /// Receives frames and close notifications.
    observer: Arc<dyn ChannelObserver>,
    /// Current link or attempt.
    slot: Mutex<Slot>,
    /// Publishes state changes.
    state_tx: watch::Sender<ChannelState>,
    /// Last generation handed out; each attempt gets a new one.
    generation: AtomicU64,
    /// Limit for one connection attempt.
    connect_timeout: Option<Duration>,
}

impl ChannelInner {
    /// Replaces the slot and publishes the new state. Caller holds the lock.
    fn set_slot(&self, slot: &mut Slot, next: Slot) -> Slot {
        let state = next.state();
        let previous = std::mem::replace(slot, next);
        self.state_tx.send_replace(state);
        previous
    }
}

impl LinkEvents for ChannelInner {
    fn on_message(&self, frame: &str) {
        self.observer.on_message(frame);
    }

    fn on_closed(&self, generation: u64, reason: String) {
        let mut slot = self.slot.lock();

        let current = matches!(&*slot, Slot::Open(connection) if connection.generation() == generation);
        if !current {
            debug!(generation, %reason, "Ignoring close of stale connection");
            return;
        }

        self.set_slot(&mut slot, Slot::Closed);
        warn!(generation, %reason, "Channel to host closed");

        // Still under the slot lock: no new connection can open in between
        self.observer.on_closed(&reason);
    }
}

/// Owns the single duplex channel to the host.
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct ChannelManager {
    inner: Arc<ChannelInner>,
}

impl fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelManager")
            .field("transport", &self.inner.transport.describe())
            .field("state", &self.state())
            .field("connect_timeout", &self.inner.connect_timeout)
            .finish_non_exhaustive()
    }
}

impl ChannelManager {
    /// Creates a manager in the Closed state. Nothing connects yet.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        observer: Arc<dyn ChannelObserver>,
        connect_timeout: Option<Duration>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Closed);
        Self {
            inner: Arc::new(ChannelInner {
                transport,
                observer,
                slot: Mutex::new(Slot::Closed),
                state_tx,
                generation: AtomicU64::new(0),
                connect_timeout,
            }),
        }
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.inner.state_tx.borrow()
    }

    /// Returns a receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state_tx.subscribe()
    }

    /// Makes sure the channel is open, connecting if needed.
    ///
    /// Concurrent callers share one attempt and all see its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the attempt fails or times out.
    pub async fn ensure_open(&self) -> Result<()> {
        let mut outcome = {
            let mut slot = self.inner.slot.lock();
            match &*slot {
                Slot::Open(_) => return Ok(()),
                Slot::Connecting { outcome, .. } => outcome.clone(),
                Slot::Closed => {
                    let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let (outcome_tx, outcome_rx) = watch::channel(None);
                    self.inner.set_slot(
                        &mut slot,
                        Slot::Connecting {
                            generation,
                            outcome: outcome_rx.clone(),
                        },
                    );
                    tokio::spawn(Self::connect(Arc::clone(&self.inner), generation, outcome_tx));
                    outcome_rx
                }
            }
        };

        let result = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Error::connection("connection attempt was abandoned"))?
            .clone();

        match result {
            Some(Ok(())) => Ok(()),
            Some(Err(message)) => Err(Error::connection(message)),
            None => Err(Error::connection("connection attempt was abandoned")),
        }
    }

    /// Writes one request to the open channel.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelNotOpen`] unless the channel is Open
    /// - [`Error::HostDisconnected`] if the link fails during the write
    pub async fn send(&self, request: &Request) -> Result<()> {
        let frame = request.to_frame()?;

        let connection = match &*self.inner.slot.lock() {
            Slot::Open(connection) => connection.clone(),
            _ => return Err(Error::ChannelNotOpen),
        };

        connection.send(frame).await?;
        debug!(request_id = %request.id, action = %request.action, "Request sent");
        Ok(())
    }

    /// Closes the channel and fails everything outstanding on it.
    ///
    /// The manager stays usable: the next [`ensure_open`](Self::ensure_open)
    /// connects again.
    pub fn close(&self) {
        let mut slot = self.inner.slot.lock();

        match self.inner.set_slot(&mut slot, Slot::Closed) {
            Slot::Open(connection) => {
                info!(generation = connection.generation(), "Closing channel");
                connection.shutdown();
            }
            Slot::Connecting { generation, .. } => {
                info!(generation, "Abandoning connection attempt");
            }
            Slot::Closed => {}
        }

        self.inner.observer.on_closed(REASON_CLOSED_BY_BRIDGE);
    }

    /// Runs one connection attempt and publishes its outcome.
    async fn connect(
        inner: Arc<ChannelInner>,
        generation: u64,
        outcome_tx: watch::Sender<ConnectOutcome>,
    ) {
        info!(generation, transport = %inner.transport.describe(), "Connecting to host");

        let attempt = inner.transport.connect();
        let result = match inner.connect_timeout {
            Some(limit) => timeout(limit, attempt).await.unwrap_or_else(|_| {
                Err(Error::connection(format!(
                    "timed out after {}ms",
                    limit.as_millis()
                )))
            }),
            None => attempt.await,
        };

        let outcome = {
            let mut slot = inner.slot.lock();

            let current = matches!(&*slot, Slot::Connecting { generation: g, .. } if *g == generation);
            match result {
                _ if !current => {
                    debug!(generation, "Connection attempt superseded by close");
                    Err(String::from(REASON_CLOSED_BY_BRIDGE))
                }
                Ok(link) => {
                    info!(generation, peer = %link.peer(), "Channel open");
                    let events: Weak<dyn LinkEvents> = Arc::downgrade(&inner) as Weak<dyn LinkEvents>;
                    let connection = Connection::spawn(link, generation, events);
                    inner.set_slot(&mut slot, Slot::Open(connection));
                    Ok(())
                }
                Err(e) => {
                    warn!(generation, error = %e, "Connection to host failed");
                    inner.set_slot(&mut slot, Slot::Closed);
                    Err(connection_message(e))
                }
            }
        };

        outcome_tx.send_replace(Some(outcome));
    }
}

/// Message reported to waiters, without doubling the "Connection failed" prefix.
fn connection_message(error: Error) -> String {
    match error {
        Error::Connection { message } => message,
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
