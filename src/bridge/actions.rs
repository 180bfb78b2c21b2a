//! Typed helpers for the host's actions.
//!
//! Thin wrappers over [`Bridge::request`] that build the payload and
//! decode the reply. Replies of `analyze_error` and `update_config` that
//! carry `{"error": ...}` inside successful data are raised as
//! [`Error::Host`](crate::Error::Host).

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::error::Result;
use crate::protocol::action::reject_embedded_error;
use crate::protocol::{Action, Analysis, AnalyzeErrorParams, ConfigUpdate, ConfigUpdateOutcome, HealthReport};

use super::core::Bridge;

// ============================================================================
// Bridge - Actions
// ============================================================================

impl Bridge {
    /// Sends a typed action and returns the raw reply data.
    ///
    /// # Errors
    ///
    /// Same as [`Bridge::request`].
    pub async fn perform(&self, action: Action) -> Result<Value> {
        let (name, payload) = action.into_parts()?;
        self.request(name, payload).await
    }

    /// Checks that the host answers. The host replies `"pong"`.
    ///
    /// # Errors
    ///
    /// Same as [`Bridge::request`].
    pub async fn ping(&self) -> Result<Value> {
        self.perform(Action::Ping).await
    }

    /// Asks whether the host's analysis backend is ready.
    ///
    /// # Errors
    ///
    /// Same as [`Bridge::request`], plus [`Error::Json`](crate::Error::Json)
    /// if the reply is not a health report.
    pub async fn health_check(&self) -> Result<HealthReport> {
        let data = self.perform(Action::HealthCheck).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// Asks the host to explain an error.
    ///
    /// # Errors
    ///
    /// Same as [`Bridge::request`]. A domain error in the reply data is
    /// returned as [`Error::Host`](crate::Error::Host).
    pub async fn analyze_error(&self, params: AnalyzeErrorParams) -> Result<Analysis> {
        let data = self.perform(Action::AnalyzeError(params)).await?;
        decode_checked(data)
    }

    /// Like [`analyze_error`](Self::analyze_error), calling `on_progress`
    /// for each progress event the host streams.
    ///
    /// # Errors
    ///
    /// Same as [`analyze_error`](Self::analyze_error).
    pub async fn analyze_error_with_progress<F>(&self, params: AnalyzeErrorParams, on_progress: F) -> Result<Analysis>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let (name, payload) = Action::AnalyzeError(params).into_parts()?;
        let data = self.call(name, payload).on_progress(on_progress).send().await?;
        decode_checked(data)
    }

    /// Updates the host's configuration.
    ///
    /// # Errors
    ///
    /// Same as [`Bridge::request`]. A domain error in the reply data is
    /// returned as [`Error::Host`](crate::Error::Host).
    pub async fn update_config(&self, update: ConfigUpdate) -> Result<ConfigUpdateOutcome> {
        let data = self.perform(Action::UpdateConfig(update)).await?;
        decode_checked(data)
    }
}

/// Raises an embedded error, then decodes the reply data.
fn decode_checked<T>(data: Value) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    reject_embedded_error(&data)?;
    Ok(serde_json::from_value(data)?)
}

// ============================================================================
// Tests
// ============================================================================
