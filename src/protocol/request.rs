//! Request and final Response message types.
//!
//! A request is the only outbound envelope. A response is the final,
//! settling answer for one request ID.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

// ============================================================================
// Request
// ============================================================================

/// An outbound request from the bridge to the host.
///
/// # Format
///
/// ```json
/// {
///   "requestId": "uuid",
///   "action": "analyze_error",
///   "payload": { ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    #[serde(rename = "requestId")]
    pub id: RequestId,

    /// Host action name.
    pub action: String,

    /// Action arguments.
    #[serde(default = "empty_payload")]
    pub payload: Value,
}

fn empty_payload() -> Value {
    Value::Object(Map::new())
}

impl Request {
    /// Creates a new request with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn new(action: impl Into<String>, payload: Value) -> Self {
        Self::with_id(RequestId::generate(), action, payload)
    }

    /// Creates a new request with specific ID.
    #[inline]
    #[must_use]
    pub fn with_id(id: RequestId, action: impl Into<String>, payload: Value) -> Self {
        Self {
            id,
            action: action.into(),
            payload,
        }
    }

    /// Serializes the request into a single wire frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload cannot be serialized.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// ResponseStatus
// ============================================================================

/// Status of a final response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// The host completed the action.
    Success,
    /// The host rejected or failed the action.
    Error,
}

// ============================================================================
// Response
// ============================================================================

/// A final response from the host for one request.
///
/// # Format
///
/// Success:
/// ```json
/// { "requestId": "uuid", "status": "success", "data": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "requestId": "uuid", "status": "error", "error": "unknown_action", "message": "Unknown action: x" }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Matches the request `requestId`.
    pub id: RequestId,

    /// Final status.
    pub status: ResponseStatus,

    /// Result data (null when absent).
    pub data: Value,

    /// Error code or message (if error).
    pub error: Option<String>,

    /// Human-readable error message (if error).
    pub message: Option<String>,
}

impl Response {
    /// Creates a success response.
    #[must_use]
    pub fn success(id: RequestId, data: Value) -> Self {
        Self {
            id,
            status: ResponseStatus::Success,
            data,
            error: None,
            message: None,
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn error(id: RequestId, error: Option<String>, message: Option<String>) -> Self {
        Self {
            id,
            status: ResponseStatus::Error,
            data: Value::Null,
            error,
            message,
        }
    }

    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }

    /// Extracts the result value, returning error if response was error.
    ///
    /// The host message is `message` when present, otherwise `error`.
    /// When both are present `error` is kept as the error code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Host`] if the response was an error.
    pub fn into_result(self) -> Result<Value> {
        match self.status {
            ResponseStatus::Success => Ok(self.data),
            ResponseStatus::Error => Err(match (self.message, self.error) {
                (Some(message), Some(code)) => Error::host_with_code(message, code),
                (Some(message), None) | (None, Some(message)) => Error::host(message),
                (None, None) => Error::host("unknown error"),
            }),
        }
    }

    /// Renders the response in wire form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut value = json!({
            "requestId": self.id,
            "status": self.status,
        });
        match self.status {
            ResponseStatus::Success => {
                value["data"] = self.data.clone();
            }
            ResponseStatus::Error => {
                if let Some(error) = &self.error {
                    value["error"] = Value::String(error.clone());
                }
                if let Some(message) = &self.message {
                    value["message"] = Value::String(message.clone());
                }
            }
        }
        value
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = Request::new("analyze_error", json!({"text": "NRE at line 12"}));
        let json = request.to_frame().expect("serialize");

        assert!(json.contains("\"requestId\""));
        assert!(json.contains("\"action\":\"analyze_error\""));
        assert!(json.contains("NRE at line 12"));
    }

    #[test]
    fn test_request_with_id() {
        let id = RequestId::generate();
        let request = Request::with_id(id, "ping", json!({}));
        assert_eq!(request.id, id);
        assert_eq!(request.action, "ping");
    }

    #[test]
    fn test_request_payload_defaults_to_empty_object() {
        let raw = r#"{"requestId":"550e8400-e29b-41d4-a716-446655440000","action":"ping"}"#;
        let request: Request = serde_json::from_str(raw).expect("parse");
        assert_eq!(request.payload, json!({}));
    }

    #[test]
    fn test_into_result_success() {
        let response = Response::success(RequestId::generate(), json!({"pong": true}));
        assert!(response.is_success());
        let data = response.into_result().expect("should succeed");
        assert_eq!(data, json!({"pong": true}));
    }

    #[test]
    fn test_into_result_error_only_code() {
        let response = Response::error(RequestId::generate(), Some("timeout".into()), None);
        assert!(response.is_error());
        match response.into_result() {
            Err(Error::Host { message, code }) => {
                assert_eq!(message, "timeout");
                assert_eq!(code, None);
            }
            other => panic!("expected host error, got {other:?}"),
        }
    }

    #[test]
    fn test_into_result_error_prefers_message() {
        let response = Response::error(
            RequestId::generate(),
            Some("unknown_action".into()),
            Some("Unknown action: frobnicate".into()),
        );
        match response.into_result() {
            Err(Error::Host { message, code }) => {
                assert_eq!(message, "Unknown action: frobnicate");
                assert_eq!(code.as_deref(), Some("unknown_action"));
            }
            other => panic!("expected host error, got {other:?}"),
        }
    }

    #[test]
    fn test_into_result_error_without_details() {
        let response = Response::error(RequestId::generate(), None, None);
        let err = response.into_result().unwrap_err();
        assert_eq!(err.to_string(), "Host error: unknown error");
    }

    #[test]
    fn test_response_to_json_shapes() {
        let id = RequestId::generate();
        let ok = Response::success(id, json!("pong")).to_json();
        assert_eq!(ok["status"], "success");
        assert_eq!(ok["data"], "pong");
        assert_eq!(ok["requestId"], id.to_string());

        let err = Response::error(id, Some("timeout".into()), None).to_json();
        assert_eq!(err["status"], "error");
        assert_eq!(err["error"], "timeout");
        assert!(err.get("message").is_none());
    }
}
