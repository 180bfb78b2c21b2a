//! Host action definitions.
//!
//! Actions are serialized adjacently tagged as `action` + `payload`,
//! which is exactly the body of an outbound [`Request`](super::Request).
//!
//! # Actions
//!
//! | Action | Payload | Reply data |
//! |--------|---------|------------|
//! | `ping` | `{}` | `"pong"` |
//! | `health_check` | `{}` | [`HealthReport`] |
//! | `analyze_error` | [`AnalyzeErrorParams`] | [`Analysis`] or `{"error": ...}` |
//! | `update_config` | [`ConfigUpdate`] | [`ConfigUpdateOutcome`] or `{"error": ...}` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// Action
// ============================================================================

/// Actions understood by the analysis host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum Action {
    /// Liveness check.
    Ping,

    /// Reports whether the host's analysis backend is initialized.
    HealthCheck,

    /// Explains an error message scraped from the page.
    AnalyzeError(AnalyzeErrorParams),

    /// Rewrites host configuration and refreshes its session.
    UpdateConfig(ConfigUpdate),
}

impl Action {
    /// Returns the wire name of the action.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::HealthCheck => "health_check",
            Self::AnalyzeError(_) => "analyze_error",
            Self::UpdateConfig(_) => "update_config",
        }
    }

    /// Splits the action into its wire name and payload.
    ///
    /// Unit actions get an empty object payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the payload cannot be serialized.
    pub fn into_parts(self) -> Result<(&'static str, Value)> {
        let name = self.name();
        let payload = match self {
            Self::Ping | Self::HealthCheck => Value::Object(Map::new()),
            Self::AnalyzeError(params) => serde_json::to_value(params)?,
            Self::UpdateConfig(update) => serde_json::to_value(update)?,
        };
        Ok((name, payload))
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Arguments for `analyze_error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeErrorParams {
    /// Error text to explain.
    pub text: String,

    /// Where the text was found (page section, product area).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Local timestamp of the capture, as displayed to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl AnalyzeErrorParams {
    /// Creates params with only the error text.
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Sets the capture context.
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Sets the capture timestamp.
    #[inline]
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

/// Arguments for `update_config`.
///
/// `config` is merged into the host's existing configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    /// Replacement system instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instructions: Option<String>,

    /// Keys to merge into the host configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
}

impl ConfigUpdate {
    /// Sets replacement system instructions.
    #[inline]
    #[must_use]
    pub fn with_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = Some(instructions.into());
        self
    }

    /// Adds one configuration key to merge.
    #[inline]
    #[must_use]
    pub fn with_config_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }
}

// ============================================================================
// Replies
// ============================================================================

/// Reply data of `health_check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `"healthy"` or `"error"`.
    pub status: String,

    /// Human-readable detail.
    #[serde(default)]
    pub message: String,
}

impl HealthReport {
    /// Returns `true` if the host reports itself healthy.
    #[inline]
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Reply data of a successful `analyze_error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    /// Explanation rendered as markdown.
    pub markdown: String,

    /// File the host saved the report to.
    #[serde(default)]
    pub saved_to: Option<String>,
}

/// Reply data of a successful `update_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdateOutcome {
    /// Whether the host refreshed its session.
    #[serde(default)]
    pub success: bool,

    /// Human-readable detail.
    #[serde(default)]
    pub message: String,
}

/// Raises a domain error embedded in successful reply data.
///
/// Some actions answer with `status: success` and `data: {"error": "..."}`;
/// that is still a failed action from the caller's point of view.
///
/// # Errors
///
/// Returns [`Error::Host`] if `data.error` is present and not null.
pub fn reject_embedded_error(data: &Value) -> Result<()> {
    match data.get("error") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(message)) => Err(Error::host(message.clone())),
        Some(other) => Err(Error::host(other.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_action_serialization_matches_request_body() {
        let action = Action::AnalyzeError(
            AnalyzeErrorParams::new("NRE at line 12").with_context("Case 4711"),
        );
        let value = serde_json::to_value(&action).expect("serialize");

        assert_eq!(value["action"], "analyze_error");
        assert_eq!(value["payload"]["text"], "NRE at line 12");
        assert_eq!(value["payload"]["context"], "Case 4711");
        assert!(value["payload"].get("timestamp").is_none());
    }

    #[test]
    fn test_unit_action_into_parts() {
        let (name, payload) = Action::Ping.into_parts().expect("parts");
        assert_eq!(name, "ping");
        assert_eq!(payload, json!({}));

        let (name, _) = Action::HealthCheck.into_parts().expect("parts");
        assert_eq!(name, "health_check");
    }

    #[test]
    fn test_update_config_into_parts() {
        let update = ConfigUpdate::default()
            .with_system_instructions("Be terse.")
            .with_config_value("model", json!("gpt-4.1"));
        let (name, payload) = Action::UpdateConfig(update).into_parts().expect("parts");

        assert_eq!(name, "update_config");
        assert_eq!(payload["system_instructions"], "Be terse.");
        assert_eq!(payload["config"]["model"], "gpt-4.1");
    }

    #[test]
    fn test_action_name_agrees_with_serde_tag() {
        let actions = [
            Action::Ping,
            Action::HealthCheck,
            Action::AnalyzeError(AnalyzeErrorParams::new("x")),
            Action::UpdateConfig(ConfigUpdate::default()),
        ];
        for action in actions {
            let value = serde_json::to_value(&action).expect("serialize");
            assert_eq!(value["action"], action.name());
        }
    }

    #[test]
    fn test_health_report() {
        let report: HealthReport =
            serde_json::from_value(json!({"status": "healthy", "message": "Copilot SDK Active"}))
                .expect("parse");
        assert!(report.is_healthy());

        let report: HealthReport =
            serde_json::from_value(json!({"status": "error"})).expect("parse");
        assert!(!report.is_healthy());
        assert_eq!(report.message, "");
    }

    #[test]
    fn test_reject_embedded_error() {
        assert!(reject_embedded_error(&json!({"markdown": "ok"})).is_ok());
        assert!(reject_embedded_error(&json!({"error": null})).is_ok());
        assert!(reject_embedded_error(&json!("pong")).is_ok());

        let err = reject_embedded_error(&json!({"error": "No text provided for analysis."}))
            .unwrap_err();
        assert_eq!(err.to_string(), "Host error: No text provided for analysis.");
    }
}
