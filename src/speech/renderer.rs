//! Speech renderer — turns a response string into audible speech.
//!
//! The renderer layers the output paths so that a call always completes
//! exactly once, whatever fails along the way:
//!
//! ```text
//! render(text)
//!   ├─ muted            → Skipped (text stays in the chat log only)
//!   ├─ remote enabled   → synthesize → play        → Remote
//!   │     └─ any failure (no backend, HTTP error,
//!   │        empty audio, playback error) ─────────┐
//!   └─ local platform speech ◀─────────────────────┘ → Local
//! ```
//!
//! A local-speech failure is logged and absorbed as well; leaving the
//! scheduler waiting on a completion that never comes would deadlock the
//! session.

use std::sync::Arc;

use crate::config::TtsConfig;

use super::elevenlabs::TtsBackend;
use super::playback::{AudioSink, LocalSpeech};

// ---------------------------------------------------------------------------
// RenderPath
// ---------------------------------------------------------------------------

/// Which output path a [`SpeechRenderer::render`] call took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPath {
    /// Output is muted; nothing was synthesized or played.
    Skipped,
    /// Remote synthesis succeeded and the audio was played.
    Remote,
    /// Local platform synthesis was used (preference or fallback).
    Local,
}

// ---------------------------------------------------------------------------
// SpeechRenderer
// ---------------------------------------------------------------------------

/// Converts response text to audible speech with remote-then-local
/// fallback.  Never returns an error; completes exactly once per call.
pub struct SpeechRenderer {
    remote: Option<Arc<dyn TtsBackend>>,
    sink: Arc<dyn AudioSink>,
    local: Arc<dyn LocalSpeech>,
}

impl SpeechRenderer {
    /// Assemble a renderer.  `remote` is `None` when no provider key is
    /// configured; the remote path is then skipped entirely.
    pub fn new(
        remote: Option<Arc<dyn TtsBackend>>,
        sink: Arc<dyn AudioSink>,
        local: Arc<dyn LocalSpeech>,
    ) -> Self {
        Self {
            remote,
            sink,
            local,
        }
    }

    /// Speak `text` according to the given TTS preferences.
    ///
    /// Resolves when audio playback ends (or immediately when muted or
    /// everything failed).  The returned [`RenderPath`] reports which path
    /// was taken.
    pub async fn render(&self, text: &str, tts: &TtsConfig, muted: bool) -> RenderPath {
        if muted {
            log::debug!("renderer: muted, skipping speech output");
            return RenderPath::Skipped;
        }

        if tts.use_remote {
            match &self.remote {
                Some(remote) => match remote.synthesize(text, &tts.voice_id).await {
                    Ok(audio) => match self.sink.play(audio).await {
                        Ok(()) => return RenderPath::Remote,
                        Err(e) => {
                            log::warn!("renderer: playback failed ({e}), using local speech");
                        }
                    },
                    Err(e) => {
                        log::warn!("renderer: remote synthesis failed ({e}), using local speech");
                    }
                },
                None => {
                    log::warn!("renderer: remote TTS requested but not configured, using local speech");
                }
            }
        }

        if let Err(e) = self.local.speak(text).await {
            log::warn!("renderer: local speech failed: {e}");
        }
        RenderPath::Local
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
