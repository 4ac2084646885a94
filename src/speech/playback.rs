//! Audio output backends.
//!
//! [`AudioSink`] plays synthesized audio bytes to completion (rodio
//! implementation); [`LocalSpeech`] is the platform speak-this-text
//! fallback used whenever remote synthesis is unavailable.  Both are
//! object-safe traits so the renderer can be tested with instant fakes.
//!
//! Cancellation contract: the scheduler cancels speech output by dropping
//! the in-flight future (user stop mid-Speaking), so both backends must
//! fall silent when that happens — the rodio sink is stopped through
//! [`PlaybackControl`], the synthesiser child process is killed on drop.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors that can occur while producing audible output.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No audio output device could be opened.
    #[error("audio output unavailable: {0}")]
    Device(String),

    /// The audio payload could not be decoded.
    #[error("could not decode audio payload: {0}")]
    Decode(String),

    /// The local speech synthesiser failed.
    #[error("local speech synthesis failed: {0}")]
    Synth(String),

    /// The blocking playback task failed to complete.
    #[error("playback task failed: {0}")]
    Task(String),
}

// ---------------------------------------------------------------------------
// AudioSink trait
// ---------------------------------------------------------------------------

/// Plays an audio payload and resolves when playback ends.  Dropping the
/// returned future must stop the audio.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Decode and play `audio` to completion.
    async fn play(&self, audio: Vec<u8>) -> Result<(), PlaybackError>;
}

// ---------------------------------------------------------------------------
// PlaybackControl
// ---------------------------------------------------------------------------

/// Stop seam between a `play` call and its blocking playback thread.
/// Kept behind a trait so cancellation can be exercised without an audio
/// device.
trait Stoppable: Send + Sync {
    fn halt(&self);
}

impl Stoppable for rodio::Sink {
    fn halt(&self) {
        self.stop();
    }
}

#[derive(Default)]
struct PlaybackControl {
    state: Mutex<ControlState>,
}

#[derive(Default)]
struct ControlState {
    cancelled: bool,
    sink: Option<Arc<dyn Stoppable>>,
}

impl PlaybackControl {
    /// Hand the live sink to the control.  Returns `false` when playback
    /// was already cancelled; the caller must not start it.
    fn register(&self, sink: Arc<dyn Stoppable>) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.cancelled {
            return false;
        }
        state.sink = Some(sink);
        true
    }

    /// Stop playback.  Safe in any order: before the sink exists, while it
    /// is playing, or after it already drained.
    fn cancel(&self) {
        let mut state = self.state.lock().unwrap();
        state.cancelled = true;
        if let Some(sink) = state.sink.take() {
            sink.halt();
        }
    }
}

/// Cancels the associated playback when dropped.
struct StopOnDrop(Arc<PlaybackControl>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

// ---------------------------------------------------------------------------
// RodioSink
// ---------------------------------------------------------------------------

/// Default sink playing through the system output device via rodio.
#[derive(Debug, Default)]
pub struct RodioSink;

impl RodioSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioSink for RodioSink {
    /// Play `audio` on the default output device.
    ///
    /// rodio's output stream handle is not `Send`, so the entire open →
    /// decode → drain sequence runs on the blocking thread pool.  The
    /// blocking task cannot be aborted, so cancellation goes through a
    /// [`PlaybackControl`]: dropping this future stops the sink, which
    /// unblocks `sleep_until_end` and lets the task finish.
    async fn play(&self, audio: Vec<u8>) -> Result<(), PlaybackError> {
        let control = Arc::new(PlaybackControl::default());
        let guard = StopOnDrop(Arc::clone(&control));
        let worker = Arc::clone(&control);

        let task = tokio::task::spawn_blocking(move || {
            let (_stream, handle) = rodio::OutputStream::try_default()
                .map_err(|e| PlaybackError::Device(e.to_string()))?;
            let sink = Arc::new(
                rodio::Sink::try_new(&handle)
                    .map_err(|e| PlaybackError::Device(e.to_string()))?,
            );

            if !worker.register(Arc::clone(&sink) as Arc<dyn Stoppable>) {
                return Ok(());
            }

            let source = rodio::Decoder::new(std::io::Cursor::new(audio))
                .map_err(|e| PlaybackError::Decode(e.to_string()))?;

            sink.append(source);
            sink.sleep_until_end();
            Ok(())
        });

        let result = task.await.map_err(|e| PlaybackError::Task(e.to_string()))?;
        // Playback already drained; stopping the sink now is a no-op.
        drop(guard);
        result
    }
}

// ---------------------------------------------------------------------------
// LocalSpeech trait
// ---------------------------------------------------------------------------

/// Platform text-to-speech fallback: speak `text`, resolve when finished.
/// Dropping the returned future must stop the speech.
#[async_trait]
pub trait LocalSpeech: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), PlaybackError>;
}

// ---------------------------------------------------------------------------
// CommandSpeech
// ---------------------------------------------------------------------------

/// Local synthesis by shelling out to the platform speech command
/// (`say` on macOS, `espeak` elsewhere).
pub struct CommandSpeech {
    program: String,
}

impl CommandSpeech {
    /// Use an explicit synthesiser program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Pick the conventional synthesiser for the current platform.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("say")
        } else {
            Self::new("espeak")
        }
    }
}

#[async_trait]
impl LocalSpeech for CommandSpeech {
    async fn speak(&self, text: &str) -> Result<(), PlaybackError> {
        // kill_on_drop: a cancelled speak must silence the child too.
        let status = tokio::process::Command::new(&self.program)
            .arg(text)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| PlaybackError::Synth(format!("{}: {e}", self.program)))?;

        if !status.success() {
            return Err(PlaybackError::Synth(format!(
                "{} exited with {status}",
                self.program
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
