//! Native host process transport.
//!
//! Each connection attempt locates the host manifest, spawns the host
//! executable with piped stdio, and speaks length-prefixed frames over
//! its stdin/stdout. Closing the link closes the host's stdin, which is
//! the host's signal to exit.

// ============================================================================
// Imports
// ============================================================================

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::host::HostLocator;

use super::framing::{DEFAULT_MAX_MESSAGE_SIZE, frame_sink, frame_stream};
use super::{Link, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Time a host gets to exit after its stdin closes before it is killed.
const EXIT_GRACE_PERIOD: Duration = Duration::from_secs(2);

// ============================================================================
// ProcessGuard
// ============================================================================

/// Guards a child process and ensures it is killed when dropped.
pub(crate) struct ProcessGuard {
    /// The child process handle.
    child: Option<Child>,
    /// Process ID for logging.
    pid: u32,
}

impl ProcessGuard {
    /// Creates a new process guard.
    fn new(child: Child) -> Self {
        let pid = child.id().unwrap_or(0);
        debug!(pid, "Process guard created");
        Self {
            child: Some(child),
            pid,
        }
    }

    /// Waits for the host to exit, killing it after the grace period.
    pub(crate) async fn shutdown(mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        match timeout(EXIT_GRACE_PERIOD, child.wait()).await {
            Ok(Ok(status)) => info!(pid = self.pid, %status, "Native host exited"),
            Ok(Err(e)) => debug!(pid = self.pid, error = %e, "Failed to wait for native host"),
            Err(_) => {
                debug!(pid = self.pid, "Native host did not exit in time, killing");
                if let Err(e) = child.kill().await {
                    debug!(pid = self.pid, error = %e, "Failed to kill native host");
                }
            }
        }
    }

    /// Returns the process ID.
    #[inline]
    pub(crate) fn pid(&self) -> u32 {
        self.pid
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take()
            && let Err(e) = child.start_kill()
        {
            debug!(pid = self.pid, error = %e, "Failed to send kill signal in Drop");
        }
    }
}

// ============================================================================
// ProcessTransport
// ============================================================================

/// Spawns the native host named by a manifest and talks to it over stdio.
///
/// The manifest is resolved on every attempt, so a host installed after
/// the bridge was built is picked up by the next request.
#[derive(Debug, Clone)]
pub struct ProcessTransport {
    /// Resolves the host manifest and executable.
    locator: HostLocator,
    /// Caller origin passed as the first argument, browser-style.
    origin: Option<String>,
    /// Inbound frame size limit.
    max_message_size: usize,
}

impl ProcessTransport {
    /// Creates a transport for the host resolved by `locator`.
    #[must_use]
    pub fn new(locator: HostLocator) -> Self {
        Self {
            locator,
            origin: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Sets the caller origin checked against `allowed_origins`.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Sets the inbound frame size limit.
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Returns the host locator.
    #[inline]
    #[must_use]
    pub fn locator(&self) -> &HostLocator {
        &self.locator
    }
}

#[async_trait]
impl Transport for ProcessTransport {
    async fn connect(&self) -> Result<Link> {
        let host = self.locator.locate()?;

        if let Some(origin) = &self.origin
            && !host.manifest.allows_origin(origin)
        {
            return Err(Error::connection(format!(
                "origin {origin} is not allowed by {}",
                host.manifest_path.display()
            )));
        }

        let mut command = Command::new(&host.executable);
        if let Some(origin) = &self.origin {
            command.arg(origin);
        }
        if let Some(dir) = host.executable.parent()
            && !dir.as_os_str().is_empty()
        {
            command.current_dir(dir);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            Error::connection(format!(
                "failed to launch native host {}: {e}",
                host.executable.display()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::connection("native host stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::connection("native host stdout was not captured"))?;

        let guard = ProcessGuard::new(child);
        info!(
            pid = guard.pid(),
            name = %host.manifest.name,
            path = %host.executable.display(),
            "Native host launched"
        );

        let peer = format!("{} (pid {})", host.manifest.name, guard.pid());
        Ok(Link::new(frame_sink(stdin), frame_stream(stdout, self.max_message_size))
            .with_peer(peer)
            .with_process(guard))
    }

    fn describe(&self) -> String {
        format!("native host {}", self.locator.name())
    }
}

// ============================================================================
// Tests
// ============================================================================
