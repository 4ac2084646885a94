//! Remote TTS backend speaking the ElevenLabs wire contract.
//!
//! Any provider honouring "text + voice id in, playable audio bytes out"
//! can be substituted behind [`TtsBackend`]; [`ElevenLabsClient`] is the
//! production implementation: POST with an `xi-api-key` header and a
//! `{ text, model_id, voice_settings }` JSON body, binary audio reply.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::TtsConfig;

/// Voice used when the preference still says `"default"`.
pub const DEFAULT_VOICE_ID: &str = "EXAVITQu4vr4xnSDxMaL";

// ---------------------------------------------------------------------------
// TtsError
// ---------------------------------------------------------------------------

/// Errors that can occur during remote speech synthesis.
#[derive(Debug, Error)]
pub enum TtsError {
    /// No API key is configured for the provider.
    #[error("no TTS API key configured")]
    MissingApiKey,

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The provider rejected the request.
    #[error("TTS provider error {status}: {body}")]
    Provider { status: u16, body: String },

    /// The provider replied with success but no audio bytes.
    #[error("TTS provider returned an empty audio payload")]
    EmptyAudio,
}

impl From<reqwest::Error> for TtsError {
    fn from(e: reqwest::Error) -> Self {
        TtsError::Request(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// TtsBackend trait
// ---------------------------------------------------------------------------

/// Async interface to a remote speech synthesis provider.
#[async_trait]
pub trait TtsBackend: Send + Sync {
    /// Synthesize `text` with the given voice and return playable audio
    /// bytes (MP3).
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, TtsError>;
}

// ---------------------------------------------------------------------------
// ElevenLabsClient
// ---------------------------------------------------------------------------

/// Production TTS backend for the ElevenLabs API.
pub struct ElevenLabsClient {
    client: reqwest::Client,
    api_key: String,
    model_id: String,
    stability: f32,
    similarity_boost: f32,
}

impl ElevenLabsClient {
    /// Build a client from TTS preferences.
    ///
    /// # Errors
    ///
    /// [`TtsError::MissingApiKey`] when no (or an empty) key is configured.
    pub fn from_config(config: &TtsConfig) -> Result<Self, TtsError> {
        let api_key = match config.api_key.as_deref() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => return Err(TtsError::MissingApiKey),
        };

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model_id: config.model_id.clone(),
            stability: config.stability,
            similarity_boost: config.similarity_boost,
        })
    }

    /// Map the `"default"` preference value to a concrete provider voice.
    fn resolve_voice_id(voice_id: &str) -> &str {
        if voice_id == "default" {
            DEFAULT_VOICE_ID
        } else {
            voice_id
        }
    }
}

#[async_trait]
impl TtsBackend for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, TtsError> {
        let voice = Self::resolve_voice_id(voice_id);
        let url = format!("https://api.elevenlabs.io/v1/text-to-speech/{voice}");

        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": {
                "stability": self.stability,
                "similarity_boost": self.similarity_boost,
            }
        });

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Provider { status, body });
        }

        let audio = response.bytes().await?;
        if audio.is_empty() {
            return Err(TtsError::EmptyAudio);
        }

        Ok(audio.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
