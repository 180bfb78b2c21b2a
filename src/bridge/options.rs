//! Bridge tuning options.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use native_host_bridge::BridgeOptions;
//!
//! let options = BridgeOptions::new()
//!     .with_request_timeout(Duration::from_secs(120))
//!     .with_max_pending(32);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::framing::DEFAULT_MAX_MESSAGE_SIZE;

use super::correlator::DEFAULT_MAX_PENDING;

// ============================================================================
// Constants
// ============================================================================

/// Default limit for one connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// BridgeOptions
// ============================================================================

/// Runtime options of a [`Bridge`](super::Bridge).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Per-request limit. `None` waits until the host answers or the
    /// channel closes.
    pub request_timeout: Option<Duration>,

    /// Limit for one connection attempt. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,

    /// Maximum number of outstanding requests.
    pub max_pending: usize,

    /// Largest inbound frame accepted from the host, in bytes.
    pub max_message_size: usize,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl BridgeOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            request_timeout: None,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            max_pending: DEFAULT_MAX_PENDING,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BridgeOptions {
    /// Fails requests the host has not answered within `timeout`.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the connection attempt limit.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Lets connection attempts run without a limit.
    #[inline]
    #[must_use]
    pub fn without_connect_timeout(mut self) -> Self {
        self.connect_timeout = None;
        self
    }

    /// Sets the maximum number of outstanding requests.
    #[inline]
    #[must_use]
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Sets the inbound frame size limit.
    #[inline]
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BridgeOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid option.
    pub fn validate(&self) -> Result<()> {
        if self.max_pending == 0 {
            return Err(Error::config("max_pending must be greater than zero"));
        }

        if self.max_message_size == 0 {
            return Err(Error::config("max_message_size must be greater than zero"));
        }

        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("request_timeout must be greater than zero"));
        }

        if self.connect_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("connect_timeout must be greater than zero"));
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

    #[test]
    fn test_defaults() {
        let options = BridgeOptions::new();
        assert_eq!(options.request_timeout, None);
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.max_pending, 100);
        assert_eq!(options.max_message_size, 1024 * 1024);
        assert_eq!(options, BridgeOptions::default());
        options.validate().expect("defaults are valid");
    }

    #[test]
    fn test_builder_methods() {
        let options = BridgeOptions::new()
            .with_request_timeout(Duration::from_secs(5))
            .without_connect_timeout()
            .with_max_pending(8)
            .with_max_message_size(4096);

        assert_eq!(options.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.connect_timeout, None);
        assert_eq!(options.max_pending, 8);
        assert_eq!(options.max_message_size, 4096);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(BridgeOptions::new().with_max_pending(0).validate().is_err());
        assert!(BridgeOptions::new().with_max_message_size(0).validate().is_err());
        assert!(
            BridgeOptions::new()
                .with_request_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
