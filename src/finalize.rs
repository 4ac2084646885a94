//! Utterance finalization — debounces interim transcripts into turns.
//!
//! Continuous recognition produces a stream of partial transcripts while
//! the user is still talking.  [`UtteranceFinalizer`] watches that stream
//! and emits exactly one [`Utterance`] once no new interim update has
//! arrived for the configured quiet window (debounce, not throttle: every
//! non-empty update re-arms the timer).  Empty or whitespace-only updates
//! neither arm nor reset the timer, so silence can never finalize into an
//! empty turn.  A [`FinalizerInput::Reset`] discards the buffered
//! transcript outright; the scheduler sends one whenever the session
//! stops or re-enters listening.

use std::time::SystemTime;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Duration, Instant};

// ---------------------------------------------------------------------------
// Utterance
// ---------------------------------------------------------------------------

/// One finalized unit of user speech, ready for dispatch.
///
/// Immutable once created; consumed exactly once by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// The last non-empty interim transcript of the speaking turn, trimmed.
    pub text: String,
    /// Wall-clock time at which the quiet window expired.
    pub finalized_at: SystemTime,
}

impl Utterance {
    /// Create an utterance finalized now.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            finalized_at: SystemTime::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// FinalizerInput
// ---------------------------------------------------------------------------

/// Input stream consumed by [`UtteranceFinalizer::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizerInput {
    /// A new (possibly partial) transcript of the utterance in progress.
    Interim(String),

    /// Discard the buffered transcript and disarm the quiet-window timer.
    /// Sent when the session stops or (re)enters listening, so speech from
    /// before the transition can never finalize into a turn.
    Reset,
}

// ---------------------------------------------------------------------------
// UtteranceFinalizer
// ---------------------------------------------------------------------------

/// Debounces a stream of interim transcripts into finalized utterances.
///
/// Runs as its own task: the scheduler forwards interim text while it is
/// listening, and receives [`Utterance`]s back on a second channel.
///
/// ```rust,no_run
/// use sahaay_voice::finalize::{FinalizerInput, UtteranceFinalizer};
/// use tokio::sync::mpsc;
/// use tokio::time::Duration;
///
/// # async fn example() {
/// let (input_tx, input_rx) = mpsc::channel(32);
/// let (utterance_tx, mut utterance_rx) = mpsc::channel(8);
///
/// let finalizer = UtteranceFinalizer::new(Duration::from_millis(1_500));
/// tokio::spawn(finalizer.run(input_rx, utterance_tx));
///
/// input_tx
///     .send(FinalizerInput::Interim("turn on the lights".into()))
///     .await
///     .unwrap();
/// let utterance = utterance_rx.recv().await.unwrap();
/// assert_eq!(utterance.text, "turn on the lights");
/// # }
/// ```
pub struct UtteranceFinalizer {
    quiet_window: Duration,
}

impl UtteranceFinalizer {
    /// Create a finalizer with the given quiet window.
    pub fn new(quiet_window: Duration) -> Self {
        Self { quiet_window }
    }

    /// Consume `input_rx` until it closes, emitting finalized utterances
    /// on `utterance_tx`.
    ///
    /// A buffered transcript that has not yet survived a full quiet window
    /// when a [`FinalizerInput::Reset`] arrives or the input channel closes
    /// is discarded — finalization only ever happens on quiet-window
    /// expiry.
    pub async fn run(
        self,
        mut input_rx: mpsc::Receiver<FinalizerInput>,
        utterance_tx: mpsc::Sender<Utterance>,
    ) {
        let mut buffer: Option<String> = None;
        let mut deadline = Instant::now();

        loop {
            tokio::select! {
                maybe = input_rx.recv() => match maybe {
                    Some(FinalizerInput::Interim(text)) => {
                        let trimmed = text.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        buffer = Some(trimmed.to_string());
                        deadline = Instant::now() + self.quiet_window;
                    }
                    Some(FinalizerInput::Reset) => {
                        if buffer.take().is_some() {
                            log::debug!("finalizer: reset, discarding buffered transcript");
                        }
                    }
                    None => break,
                },
                () = sleep_until(deadline), if buffer.is_some() => {
                    if let Some(text) = buffer.take() {
                        log::debug!("finalizer: quiet window elapsed, utterance = {text:?}");
                        if utterance_tx.send(Utterance::new(text)).await.is_err() {
                            // Nobody is listening for utterances any more.
                            break;
                        }
                    }
                }
            }
        }

        log::debug!("finalizer: input channel closed, shutting down");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
