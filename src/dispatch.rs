//! Intent dispatch — sends finalized utterances to the remote responder.
//!
//! [`IntentResponder`] is the seam to the remote service; [`HttpResponder`]
//! speaks the `{ "prompt": … } → { "response": … }` JSON contract.
//! [`Dispatcher`] wraps a responder with the fail-soft policy: a turn must
//! always complete with *some* spoken reply, so any transport, timeout, or
//! payload failure maps to a fixed local apology instead of an error.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ResponderConfig;
use crate::finalize::Utterance;

// ---------------------------------------------------------------------------
// ResponderError
// ---------------------------------------------------------------------------

/// Errors that can occur while querying the intent responder.
#[derive(Debug, Error)]
pub enum ResponderError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("responder request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse responder reply: {0}")]
    Parse(String),

    /// The responder returned a reply with no usable text.
    #[error("responder returned an empty reply")]
    EmptyReply,
}

impl From<reqwest::Error> for ResponderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ResponderError::Timeout
        } else {
            ResponderError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// IntentResponder trait
// ---------------------------------------------------------------------------

/// Async interface to the remote intent responder.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn IntentResponder>`.
#[async_trait]
pub trait IntentResponder: Send + Sync {
    /// Send `prompt` and return the responder's reply text.
    async fn respond(&self, prompt: &str) -> Result<String, ResponderError>;
}

// ---------------------------------------------------------------------------
// HttpResponder
// ---------------------------------------------------------------------------

/// Calls the assistant backend over HTTP.
///
/// POSTs JSON `{ "prompt": … }` to `<base_url>/api/voice-assistant` and
/// expects JSON `{ "response": … }` back.  Any endpoint honouring that
/// request/response contract can be substituted via [`ResponderConfig`].
pub struct HttpResponder {
    client: reqwest::Client,
    config: ResponderConfig,
}

impl HttpResponder {
    /// Build an `HttpResponder` from configuration.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails.
    pub fn from_config(config: &ResponderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl IntentResponder for HttpResponder {
    async fn respond(&self, prompt: &str) -> Result<String, ResponderError> {
        let url = format!("{}/api/voice-assistant", self.config.base_url);
        let body = serde_json::json!({ "prompt": prompt });

        let response = self.client.post(&url).json(&body).send().await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ResponderError::Parse(e.to_string()))?;

        let reply = json["response"]
            .as_str()
            .ok_or(ResponderError::EmptyReply)?
            .trim()
            .to_string();

        if reply.is_empty() {
            return Err(ResponderError::EmptyReply);
        }

        Ok(reply)
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Fail-soft wrapper around an [`IntentResponder`].
///
/// [`dispatch`](Self::dispatch) never fails and never returns an empty
/// string: availability of conversational turn-taking outranks correctness
/// of content, so remote failures degrade to an apology rather than
/// stalling the turn.
pub struct Dispatcher {
    responder: Arc<dyn IntentResponder>,
    user_name: Option<String>,
}

impl Dispatcher {
    /// Wrap `responder`; `user_name` personalises the apology strings.
    pub fn new(responder: Arc<dyn IntentResponder>, user_name: Option<String>) -> Self {
        Self {
            responder,
            user_name,
        }
    }

    /// Send the utterance to the responder and return the reply text.
    ///
    /// The utterance text is lowercased before dispatch; the reply is
    /// returned verbatim.  On any failure this resolves to a fixed,
    /// non-empty apology.
    pub async fn dispatch(&self, utterance: &Utterance) -> String {
        let prompt = utterance.text.to_lowercase();

        match self.responder.respond(&prompt).await {
            Ok(reply) => reply,
            Err(err @ (ResponderError::Parse(_) | ResponderError::EmptyReply)) => {
                log::warn!("dispatch: unusable reply ({err}), using local fallback");
                format!(
                    "Sorry{}, I couldn't get a proper response.",
                    self.name_suffix()
                )
            }
            Err(err) => {
                log::warn!("dispatch: responder unreachable ({err}), using local fallback");
                format!(
                    "Something went wrong while trying to answer{}.",
                    self.name_suffix()
                )
            }
        }
    }

    fn name_suffix(&self) -> String {
        match &self.user_name {
            Some(name) if !name.is_empty() => format!(", {name}"),
            _ => String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
