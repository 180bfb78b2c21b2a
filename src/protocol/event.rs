//! Non-settling inbound message types.
//!
//! Progress events stream intermediate data for a pending request.
//! Broadcasts carry no request ID and fan out to every subscriber of
//! their kind.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};

use crate::identifiers::RequestId;

// ============================================================================
// Progress
// ============================================================================

/// An intermediate update for a pending request.
///
/// # Format
///
/// ```json
/// { "requestId": "uuid", "status": "progress", "data": "Checking logs..." }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// Request this update belongs to.
    pub id: RequestId,

    /// Progress payload.
    pub data: Value,
}

impl Progress {
    /// Creates a progress event.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, data: Value) -> Self {
        Self { id, data }
    }

    /// Renders the event in wire form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "requestId": self.id,
            "status": "progress",
            "data": self.data,
        })
    }
}

// ============================================================================
// Broadcast
// ============================================================================

/// Well-known broadcast kinds emitted by the host.
pub mod kind {
    /// A newer host/extension release is available.
    pub const UPDATE_AVAILABLE: &str = "update_available";
}

/// An unsolicited message not tied to any request.
///
/// # Format
///
/// ```json
/// { "kind": "update_available", "payload": { "version": "1.4.0" } }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast {
    /// Broadcast kind used as the subscription key.
    pub kind: String,

    /// Kind-specific payload (null when absent).
    pub payload: Value,
}

impl Broadcast {
    /// Creates a broadcast.
    #[inline]
    #[must_use]
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Renders the broadcast in wire form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "kind": self.kind,
            "payload": self.payload,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_to_json() {
        let id = RequestId::generate();
        let value = Progress::new(id, json!("Summarizing...")).to_json();
        assert_eq!(value["status"], "progress");
        assert_eq!(value["data"], "Summarizing...");
        assert_eq!(value["requestId"], id.to_string());
    }

    #[test]
    fn test_broadcast_to_json_has_no_request_id() {
        let value = Broadcast::new(kind::UPDATE_AVAILABLE, json!({"version": "1.4.0"})).to_json();
        assert_eq!(value["kind"], "update_available");
        assert_eq!(value["payload"]["version"], "1.4.0");
        assert!(value.get("requestId").is_none());
    }
}
