//! Request/response correlation.
//!
//! Every submitted request gets one pending record keyed by its
//! [`RequestId`]. Removing the record from the map is the only way a
//! request settles, so each call completes exactly once no matter which
//! of these happens first:
//!
//! | Event | Outcome |
//! |-------|---------|
//! | Final `success` | `Ok(data)` |
//! | Final `error` | [`Error::Host`] |
//! | Channel loss | [`Error::HostDisconnected`] |
//! | Timeout (if configured) | [`Error::RequestTimeout`] |
//! | Caller drops the future | record discarded |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Request, Response};
use crate::transport::ChannelManager;

// ============================================================================
// Constants
// ============================================================================

/// Default maximum number of outstanding requests.
pub const DEFAULT_MAX_PENDING: usize = 100;

/// Reason reported when the link closed before the request was written.
const REASON_LOST_BEFORE_WRITE: &str = "host closed the channel before the request was written";

// ============================================================================
// Types
// ============================================================================

/// Completion side of a pending request.
type Completion = oneshot::Sender<Result<Value>>;

/// A request waiting for its final message.
struct PendingRequest {
    /// Action name, for logs.
    action: String,
    /// When the request was registered.
    created_at: Instant,
    /// Settles the caller's future.
    completion: Completion,
}

// ============================================================================
// Correlator
// ============================================================================

/// Tracks pending requests and settles them.
pub struct Correlator {
    /// Pending requests by ID.
    pending: Mutex<FxHashMap<RequestId, PendingRequest>>,
    /// Capacity limit.
    max_pending: usize,
}

impl fmt::Debug for Correlator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correlator")
            .field("pending", &self.pending_count())
            .field("max_pending", &self.max_pending)
            .finish()
    }
}

impl Correlator {
    /// Creates an empty correlator.
    #[must_use]
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: Mutex::new(FxHashMap::default()),
            max_pending,
        }
    }

    /// Returns a fresh identifier that is not currently pending.
    #[must_use]
    pub fn next_id(&self) -> RequestId {
        let pending = self.pending.lock();
        loop {
            let id = RequestId::generate();
            if !pending.contains_key(&id) {
                return id;
            }
        }
    }

    /// Submits a request and waits for it to settle.
    ///
    /// Opens the channel if needed. If opening or writing fails, the
    /// record is removed and that error is returned right away.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if too many requests are pending
    /// - [`Error::Connection`] if the channel could not be opened
    /// - [`Error::Host`] if the host answered with an error
    /// - [`Error::HostDisconnected`] if the channel closed first
    /// - [`Error::RequestTimeout`] if `request_timeout` elapsed first
    pub async fn submit(
        &self,
        channel: &ChannelManager,
        request: Request,
        request_timeout: Option<Duration>,
    ) -> Result<Value> {
        let id = request.id;
        let completion = self.register(&request)?;
        let _guard = PendingGuard {
            correlator: self,
            id,
        };

        channel.ensure_open().await?;

        // A close between registering and opening already settled the record
        if self.is_pending(id)
            && let Err(e) = channel.send(&request).await
        {
            // The link can drop between opening and writing
            let e = match e {
                Error::ChannelNotOpen => Error::host_disconnected(REASON_LOST_BEFORE_WRITE),
                other => other,
            };
            if self.is_pending(id) {
                return Err(e);
            }
            debug!(request_id = %id, error = %e, "Send failed after the request settled");
        }

        let outcome = match request_timeout {
            Some(limit) => match timeout(limit, completion).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                    warn!(request_id = %id, action = %request.action, timeout_ms, "Request timed out");
                    return Err(Error::request_timeout(id, timeout_ms));
                }
            },
            None => completion.await,
        };

        outcome.map_err(|_| Error::host_disconnected("request was abandoned"))?
    }

    /// Settles the pending request matching a final message.
    ///
    /// Returns `false` if nothing was pending under that ID, in which case
    /// the message is ignored.
    pub fn resolve_final(&self, response: Response) -> bool {
        let Some(record) = self.pending.lock().remove(&response.id) else {
            return false;
        };

        trace!(
            request_id = %response.id,
            action = %record.action,
            elapsed_ms = u64::try_from(record.created_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            success = response.is_success(),
            "Request settled"
        );

        let _ = record.completion.send(response.into_result());
        true
    }

    /// Fails every pending request with [`Error::HostDisconnected`].
    ///
    /// The set is drained under one lock. Returns the failed IDs.
    pub fn fail_all(&self, reason: &str) -> Vec<RequestId> {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        if drained.is_empty() {
            return Vec::new();
        }

        debug!(count = drained.len(), %reason, "Failing pending requests");

        drained
            .into_iter()
            .map(|(id, record)| {
                let _ = record.completion.send(Err(Error::host_disconnected(reason)));
                id
            })
            .collect()
    }

    /// Returns `true` if `id` is waiting for its final message.
    #[inline]
    #[must_use]
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.lock().contains_key(&id)
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Removes a pending record without settling it.
    ///
    /// Returns `true` if a record was removed.
    pub fn discard(&self, id: RequestId) -> bool {
        self.pending.lock().remove(&id).is_some()
    }

    /// Registers the pending record for `request`.
    pub(crate) fn register(&self, request: &Request) -> Result<oneshot::Receiver<Result<Value>>> {
        let mut pending = self.pending.lock();

        if pending.len() >= self.max_pending {
            warn!(
                pending = pending.len(),
                max = self.max_pending,
                "Too many pending requests"
            );
            return Err(Error::protocol(format!(
                "Too many pending requests: {}/{}",
                pending.len(),
                self.max_pending
            )));
        }

        if pending.contains_key(&request.id) {
            return Err(Error::protocol(format!("request {} is already pending", request.id)));
        }

        let (completion, receiver) = oneshot::channel();
        pending.insert(
            request.id,
            PendingRequest {
                action: request.action.clone(),
                created_at: Instant::now(),
                completion,
            },
        );

        debug!(request_id = %request.id, action = %request.action, "Request registered");
        Ok(receiver)
    }
}

// ============================================================================
// PendingGuard
// ============================================================================

/// Removes the pending record if `submit` exits early or is dropped.
struct PendingGuard<'a> {
    correlator: &'a Correlator,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.correlator.discard(self.id) {
            debug!(request_id = %self.id, "Pending request discarded");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
