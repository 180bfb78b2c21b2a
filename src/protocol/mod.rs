//! Wire protocol message types.
//!
//! This module defines the envelopes exchanged between the bridge and
//! the host. It holds no state.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Bridge → Host | Action request |
//! | `Response` | Host → Bridge | Final answer, settles a request |
//! | `Progress` | Host → Bridge | Intermediate update for a request |
//! | `Broadcast` | Host → Bridge | Unsolicited notification by kind |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `action` | Known host actions and their payloads |
//! | `envelope` | Inbound classification |
//! | `event` | Progress and broadcast types |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Known host actions.
pub mod action;

/// Inbound envelope classification.
pub mod envelope;

/// Progress and broadcast message types.
pub mod event;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use action::{
    Action, Analysis, AnalyzeErrorParams, ConfigUpdate, ConfigUpdateOutcome, HealthReport,
};
pub use envelope::Inbound;
pub use event::{Broadcast, Progress, kind};
pub use request::{Request, Response, ResponseStatus};
