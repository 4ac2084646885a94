//! Session wiring — assembles the capture → finalize → dispatch → speak
//! pipeline and spawns its tasks.
//!
//! ```text
//!                    interim text         finalized utterance
//!  CaptureSource ──▶ TurnScheduler ──▶ UtteranceFinalizer ──▶ TurnScheduler
//!       ▲                 │                                        │
//!       └──── start/stop ─┘          dispatch / render / cooldown ─┘
//! ```
//!
//! The scheduler sits on both sides of the finalizer: it gates which
//! interim transcripts reach it (only while `Listening`) and consumes the
//! utterances it emits.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::capture::{CaptureEvent, CaptureSource};
use crate::config::Preferences;
use crate::dispatch::{Dispatcher, IntentResponder};
use crate::finalize::UtteranceFinalizer;
use crate::speech::{AudioSink, LocalSpeech, SpeechRenderer, TtsBackend};
use crate::turn::{new_shared_session, SessionCommand, SharedSession, TurnScheduler};

/// Channel capacity for capture and interim streams.  Transcripts are
/// small and consumed promptly; backpressure here only ever means the
/// scheduler is mid-turn and the events would be discarded anyway.
const EVENT_CHANNEL_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// SessionHandles
// ---------------------------------------------------------------------------

/// Handles returned by [`spawn_session`].
///
/// Dropping `commands` shuts the scheduler down; `session` stays readable
/// for a final snapshot.
pub struct SessionHandles {
    /// Send user actions to the scheduler.
    pub commands: mpsc::Sender<SessionCommand>,

    /// Live session state for UI layers to poll.
    pub session: SharedSession,
}

// ---------------------------------------------------------------------------
// spawn_session
// ---------------------------------------------------------------------------

/// Wire up and spawn a complete assistant session.
///
/// The caller constructs the capture source around its own
/// `mpsc::Sender<CaptureEvent>` and hands over the matching receiver; all
/// other plumbing is internal.
pub fn spawn_session(
    prefs: Preferences,
    capture: Arc<dyn CaptureSource>,
    capture_events: mpsc::Receiver<CaptureEvent>,
    responder: Arc<dyn IntentResponder>,
    remote_tts: Option<Arc<dyn TtsBackend>>,
    sink: Arc<dyn AudioSink>,
    local: Arc<dyn LocalSpeech>,
) -> SessionHandles {
    let (command_tx, command_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (interim_tx, interim_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (utterance_tx, utterance_rx) = mpsc::channel(8);

    let session = new_shared_session(prefs.user_name.as_deref());

    let quiet = std::time::Duration::from_millis(prefs.capture.quiet_window_ms);
    tokio::spawn(UtteranceFinalizer::new(quiet).run(interim_rx, utterance_tx));

    let dispatcher = Dispatcher::new(responder, prefs.user_name.clone());
    let renderer = SpeechRenderer::new(remote_tts, sink, local);

    let scheduler = TurnScheduler::new(
        Arc::clone(&session),
        capture,
        dispatcher,
        renderer,
        prefs,
        interim_tx,
    );
    tokio::spawn(scheduler.run(command_rx, capture_events, utterance_rx));

    SessionHandles {
        commands: command_tx,
        session,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
