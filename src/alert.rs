//! Emergency alert channel.
//!
//! Separate from the conversational pipeline: an emergency is triggered by
//! an explicit user action, bypasses the turn cycle entirely, and must not
//! depend on the session being active.  The alert is a simple GET against
//! a pre-configured endpoint that notifies the registered caregiver.

use thiserror::Error;

use crate::config::AlertConfig;

// ---------------------------------------------------------------------------
// AlertError
// ---------------------------------------------------------------------------

/// Errors raised when triggering an emergency alert.
#[derive(Debug, Error)]
pub enum AlertError {
    /// No alert endpoint is configured for this installation.
    #[error("no emergency contact endpoint is configured")]
    NotConfigured,

    /// The alert request could not be delivered.
    #[error("emergency alert request failed: {0}")]
    Request(String),

    /// The endpoint answered with a non-success status.
    #[error("emergency alert endpoint returned status {0}")]
    Status(u16),
}

impl From<reqwest::Error> for AlertError {
    fn from(e: reqwest::Error) -> Self {
        AlertError::Request(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// EmergencyAlerter
// ---------------------------------------------------------------------------

/// Sends emergency notifications to the configured caregiver endpoint.
pub struct EmergencyAlerter {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl EmergencyAlerter {
    /// Build an alerter from configuration.  An unset endpoint is allowed;
    /// [`trigger`](Self::trigger) then fails with
    /// [`AlertError::NotConfigured`].
    pub fn from_config(config: &AlertConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }

    /// Whether an endpoint is configured at all.
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Fire the alert and return the endpoint's confirmation text.
    pub async fn trigger(&self) -> Result<String, AlertError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(AlertError::NotConfigured)?;

        log::warn!("alert: triggering emergency notification");
        let response = self.client.get(endpoint).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlertError::Status(status.as_u16()));
        }

        let confirmation = response.text().await?;
        let confirmation = confirmation.trim();
        if confirmation.is_empty() {
            Ok("Emergency alert sent.".to_string())
        } else {
            Ok(confirmation.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
