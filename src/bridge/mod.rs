//! Request multiplexing over the host channel.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bridge`] | Public entry point: requests, subscriptions, lifecycle |
//! | [`BridgeBuilder`] | Fluent configuration builder |
//! | [`BridgeOptions`] | Timeouts and limits |
//! | [`Call`] | A request with handlers attached before sending |
//! | [`Subscription`] | Handle to a progress or broadcast handler |
//! | [`Correlator`] | Pending requests keyed by [`RequestId`](crate::RequestId) |
//! | [`Dispatcher`] | Routes inbound frames to their sink |
//!
//! # Request Flow
//!
//! 1. `Bridge::call` - allocate a fresh ID
//! 2. `Correlator::submit` - register the pending record, open the channel, write the frame
//! 3. Host streams zero or more progress events → progress handlers
//! 4. Host sends the final message → `Dispatcher` → `Correlator::resolve_final`
//! 5. Channel loss instead → every pending request fails with `HostDisconnected`

// ============================================================================
// Submodules
// ============================================================================

/// Typed host actions.
pub mod actions;

/// Fluent builder pattern for bridge configuration.
pub mod builder;

/// Requests with handlers attached before sending.
pub mod call;

/// Core bridge implementation.
pub mod core;

/// Pending request tracking.
pub mod correlator;

/// Inbound routing and subscriber lists.
pub mod dispatcher;

/// Bridge tuning options.
pub mod options;

/// Handler registrations.
pub mod subscription;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{BridgeBuilder, HostTarget};
pub use call::{Call, ProgressStream};
pub use core::Bridge;
pub use correlator::{Correlator, DEFAULT_MAX_PENDING};
pub use dispatcher::{Dispatcher, Handler, Route};
pub use options::{BridgeOptions, DEFAULT_CONNECT_TIMEOUT};
pub use subscription::{Subscription, Topic};
