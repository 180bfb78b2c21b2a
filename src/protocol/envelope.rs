//! Inbound envelope classification.
//!
//! Every frame read from the host is classified into exactly one
//! [`Inbound`] variant, or rejected as malformed.
//!
//! | Shape | Variant |
//! |-------|---------|
//! | `requestId` + `status: success\|error` | [`Inbound::Final`] |
//! | `requestId` + `status: progress` | [`Inbound::Progress`] |
//! | no `requestId`, non-empty string `kind` | [`Inbound::Broadcast`] |
//! | anything else | [`Error::MalformedMessage`] |

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::event::{Broadcast, Progress};
use super::request::Response;

// ============================================================================
// Inbound
// ============================================================================

/// A classified inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Settles the pending request with the same ID.
    Final(Response),
    /// Intermediate update for a pending request.
    Progress(Progress),
    /// Unsolicited message keyed by kind.
    Broadcast(Broadcast),
}

impl Inbound {
    /// Parses and classifies a raw text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the frame is not valid JSON
    /// or matches no known envelope shape.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::malformed(format!("invalid JSON: {e}")))?;
        Self::classify(value)
    }

    /// Classifies an already-decoded JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the value matches no known
    /// envelope shape.
    pub fn classify(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(Error::malformed("envelope is not a JSON object"));
        };

        match fields.remove("requestId") {
            None | Some(Value::Null) => {}
            Some(Value::String(raw)) => {
                let id: RequestId = raw
                    .parse()
                    .map_err(|e| Error::malformed(format!("invalid requestId {raw:?}: {e}")))?;
                return classify_correlated(id, fields);
            }
            Some(other) => {
                return Err(Error::malformed(format!(
                    "requestId must be a string, got {other}"
                )));
            }
        }

        match fields.remove("kind") {
            Some(Value::String(kind)) if !kind.is_empty() => {
                let payload = fields.remove("payload").unwrap_or(Value::Null);
                Ok(Self::Broadcast(Broadcast { kind, payload }))
            }
            Some(_) => Err(Error::malformed("broadcast kind must be a non-empty string")),
            None => Err(Error::malformed("envelope has neither requestId nor kind")),
        }
    }

    /// Returns the request ID, if the envelope carries one.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::Final(response) => Some(response.id),
            Self::Progress(progress) => Some(progress.id),
            Self::Broadcast(_) => None,
        }
    }
}

/// Classifies an envelope that carries a request ID by its status.
fn classify_correlated(id: RequestId, mut fields: Map<String, Value>) -> Result<Inbound> {
    let status = match fields.remove("status") {
        Some(Value::String(status)) => status,
        Some(other) => {
            return Err(Error::malformed(format!(
                "status must be a string, got {other} (request {id})"
            )));
        }
        None => return Err(Error::malformed(format!("missing status (request {id})"))),
    };

    let data = fields.remove("data").unwrap_or(Value::Null);

    match status.as_str() {
        "success" => Ok(Inbound::Final(Response::success(id, data))),
        "error" => {
            let error = text_field(fields.remove("error"));
            let message = text_field(fields.remove("message"));
            Ok(Inbound::Final(Response::error(id, error, message)))
        }
        "progress" => Ok(Inbound::Progress(Progress::new(id, data))),
        other => Err(Error::malformed(format!(
            "unknown status {other:?} (request {id})"
        ))),
    }
}

/// Reads an optional error field, stringifying non-string values.
fn text_field(value: Option<Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    const ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_success_final() {
        let inbound =
            Inbound::parse(&json!({"requestId": ID, "status": "success", "data": {"pong": true}}).to_string())
                .expect("classify");

        match inbound {
            Inbound::Final(response) => {
                assert!(response.is_success());
                assert_eq!(response.data, json!({"pong": true}));
                assert_eq!(response.id.to_string(), ID);
            }
            other => panic!("expected final, got {other:?}"),
        }
    }

    #[test]
    fn test_error_final_keeps_code_and_message() {
        let inbound = Inbound::classify(json!({
            "requestId": ID,
            "status": "error",
            "error": "unknown_action",
            "message": "Unknown action: x",
            "data": null
        }))
        .expect("classify");

        let Inbound::Final(response) = inbound else {
            panic!("expected final");
        };
        assert!(response.is_error());
        assert_eq!(response.error.as_deref(), Some("unknown_action"));
        assert_eq!(response.message.as_deref(), Some("Unknown action: x"));
    }

    #[test]
    fn test_non_string_error_is_stringified() {
        let inbound = Inbound::classify(json!({"requestId": ID, "status": "error", "error": 42}))
            .expect("classify");
        let Inbound::Final(response) = inbound else {
            panic!("expected final");
        };
        assert_eq!(response.error.as_deref(), Some("42"));
    }

    #[test]
    fn test_progress() {
        let inbound =
            Inbound::classify(json!({"requestId": ID, "status": "progress", "data": "Checking logs..."}))
                .expect("classify");
        assert!(matches!(inbound, Inbound::Progress(ref p) if p.data == json!("Checking logs...")));
        assert_eq!(inbound.request_id().map(|id| id.to_string()).as_deref(), Some(ID));
    }

    #[test]
    fn test_broadcast() {
        let inbound = Inbound::classify(json!({"kind": "update_available", "payload": {"version": "2.0"}}))
            .expect("classify");
        match inbound {
            Inbound::Broadcast(broadcast) => {
                assert_eq!(broadcast.kind, "update_available");
                assert_eq!(broadcast.payload["version"], "2.0");
            }
            other => panic!("expected broadcast, got {other:?}"),
        }
    }

    #[test]
    fn test_broadcast_with_null_request_id() {
        let inbound = Inbound::classify(json!({"requestId": null, "kind": "update_available"}))
            .expect("classify");
        assert!(matches!(inbound, Inbound::Broadcast(ref b) if b.payload.is_null()));
        assert!(inbound.request_id().is_none());
    }

    #[test]
    fn test_malformed_shapes() {
        let cases = [
            json!([1, 2, 3]),
            json!("just a string"),
            json!({}),
            json!({"kind": ""}),
            json!({"kind": 5}),
            json!({"requestId": 17, "status": "success"}),
            json!({"requestId": "not-a-uuid", "status": "success"}),
            json!({"requestId": ID}),
            json!({"requestId": ID, "status": "done"}),
            json!({"requestId": ID, "status": true}),
        ];

        for case in cases {
            let err = Inbound::classify(case.clone()).unwrap_err();
            assert!(
                matches!(err, Error::MalformedMessage { .. }),
                "expected malformed for {case}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let err = Inbound::parse("{not json").unwrap_err();
        assert!(matches!(err, Error::MalformedMessage { .. }));
    }
}
