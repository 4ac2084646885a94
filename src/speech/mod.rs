//! Speech output module.
//!
//! This module provides:
//! * [`SpeechRenderer`] — response text → audible speech, with fallback.
//! * [`TtsBackend`] / [`ElevenLabsClient`] — remote synthesis seam.
//! * [`AudioSink`] / [`RodioSink`] — plays synthesized audio bytes.
//! * [`LocalSpeech`] / [`CommandSpeech`] — platform speech fallback.

pub mod elevenlabs;
pub mod playback;
pub mod renderer;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use elevenlabs::{ElevenLabsClient, TtsBackend, TtsError, DEFAULT_VOICE_ID};
pub use playback::{AudioSink, CommandSpeech, LocalSpeech, PlaybackError, RodioSink};
pub use renderer::{RenderPath, SpeechRenderer};
