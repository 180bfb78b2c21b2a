//! Per-link event loop.
//!
//! Every open link gets one tokio task that owns both halves of the link.
//! The task handles:
//!
//! - Inbound frames from the host, forwarded unmodified to [`LinkEvents`]
//! - Outbound frames from the bridge, written one at a time and acknowledged
//! - Link teardown, reported once with the close reason
//!
//! Writes are serialized through the task, so a frame is never interleaved
//! with another.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Weak;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};

use super::Link;

// ============================================================================
// Constants
// ============================================================================

/// Close reason when the host ends the stream.
const REASON_HOST_CLOSED: &str = "host closed the channel";

/// Close reason for an explicit shutdown.
const REASON_BRIDGE_CLOSED: &str = "bridge closed";

/// Close reason when every connection handle was dropped.
const REASON_BRIDGE_DROPPED: &str = "bridge dropped";

// ============================================================================
// LinkEvents
// ============================================================================

/// Receives what the event loop observes on the link.
pub(crate) trait LinkEvents: Send + Sync + 'static {
    /// Called for every inbound frame, in arrival order.
    fn on_message(&self, frame: &str);

    /// Called exactly once when the link ends.
    fn on_closed(&self, generation: u64, reason: String);
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write a frame and acknowledge the outcome.
    Send {
        frame: String,
        ack: oneshot::Sender<Result<()>>,
    },
    /// Close the link.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to a running link event loop.
///
/// Cheap to clone. The loop keeps running until the host closes the link,
/// an I/O error occurs, [`Connection::shutdown`] is called, or every handle
/// is dropped.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Generation of the channel this link belongs to.
    generation: u64,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("generation", &self.generation)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    /// Spawns the event loop for `link`.
    ///
    /// Events go to `events` for as long as it is alive.
    pub(crate) fn spawn(link: Link, generation: u64, events: Weak<dyn LinkEvents>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_event_loop(link, generation, command_rx, events));

        Self {
            command_tx,
            generation,
        }
    }

    /// Writes one frame and waits until it has been flushed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HostDisconnected`] if the event loop has already
    /// stopped, the write failed, or the link ended before the frame was
    /// written.
    pub async fn send(&self, frame: String) -> Result<()> {
        let (ack, ack_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send { frame, ack })
            .map_err(|_| Error::host_disconnected(REASON_HOST_CLOSED))?;

        ack_rx
            .await
            .map_err(|_| Error::host_disconnected(REASON_HOST_CLOSED))?
    }

    /// Asks the event loop to close the link.
    ///
    /// Returns immediately; the close is reported through `on_closed`.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Returns the channel generation of this link.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Event loop that handles link I/O.
    async fn run_event_loop(
        link: Link,
        generation: u64,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        events: Weak<dyn LinkEvents>,
    ) {
        let Link {
            mut sink,
            mut stream,
            process,
            peer,
        } = link;

        debug!(generation, %peer, "Event loop started");

        let reason = loop {
            tokio::select! {
                // Incoming frames from the host
                frame = stream.next() => {
                    match frame {
                        Some(Ok(frame)) => {
                            trace!(generation, len = frame.len(), "Frame received");
                            match events.upgrade() {
                                Some(events) => events.on_message(&frame),
                                None => break String::from(REASON_BRIDGE_DROPPED),
                            }
                        }

                        Some(Err(e)) => {
                            error!(generation, error = %e, "Link read failed");
                            break e.to_string();
                        }

                        None => {
                            debug!(generation, "Link stream ended");
                            break String::from(REASON_HOST_CLOSED);
                        }
                    }
                }

                // Commands from the bridge
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { frame, ack }) => {
                            match sink.send(frame).await {
                                Ok(()) => {
                                    trace!(generation, "Frame sent");
                                    let _ = ack.send(Ok(()));
                                }
                                Err(e) => {
                                    warn!(generation, error = %e, "Link write failed");
                                    let reason = format!("write failed: {e}");
                                    let _ = ack.send(Err(Error::host_disconnected(reason.clone())));
                                    break reason;
                                }
                            }
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!(generation, "Shutdown command received");
                            let _ = sink.close().await;
                            break String::from(REASON_BRIDGE_CLOSED);
                        }

                        None => {
                            debug!(generation, "Command channel closed");
                            let _ = sink.close().await;
                            break String::from(REASON_BRIDGE_DROPPED);
                        }
                    }
                }
            }
        };

        // Fail writes queued behind the one that ended the link
        command_rx.close();
        while let Ok(command) = command_rx.try_recv() {
            if let ConnectionCommand::Send { ack, .. } = command {
                let _ = ack.send(Err(Error::host_disconnected(reason.clone())));
            }
        }

        // Host exit is signalled by its stdin closing
        drop(sink);
        drop(stream);

        debug!(generation, %peer, %reason, "Event loop terminated");

        if let Some(events) = events.upgrade() {
            events.on_closed(generation, reason);
        }

        if let Some(process) = process {
            process.shutdown().await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
