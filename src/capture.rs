//! Speech capture seam.
//!
//! [`CaptureSource`] is the exclusive handle to continuous speech capture.
//! Only the turn scheduler starts and stops it; interim transcripts flow
//! through an `mpsc` channel as [`CaptureEvent`]s so the state machine can
//! be tested without any real recognition engine behind it.
//!
//! [`TypedCapture`] is the built-in terminal backend: typed lines stand in
//! for recognised speech on platforms without a recognizer.  A real
//! recogniser backend only has to implement the same two-method contract
//! and push `Interim` events while it is active.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can arise when activating speech capture.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// Microphone permission was denied.  Non-retryable until the user
    /// grants access.
    #[error("Microphone access is required for the voice assistant")]
    PermissionDenied,

    /// No capture backend exists on this platform.
    #[error("Speech capture is not supported on this platform")]
    Unsupported,

    /// The underlying engine failed for some other reason.
    #[error("Capture engine error: {0}")]
    Engine(String),
}

// ---------------------------------------------------------------------------
// CaptureEvent
// ---------------------------------------------------------------------------

/// Events emitted by an active capture source.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// A new (possibly partial) transcript of the utterance in progress.
    /// Each event carries the full text recognised so far, not a delta.
    Interim(String),

    /// The engine stopped on its own (end of audio, engine restart, …).
    /// The scheduler restarts capture when it still wants to listen.
    Ended,
}

// ---------------------------------------------------------------------------
// CaptureSource trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe handle to a continuous speech capture engine.
///
/// # Contract
///
/// - After `start()` returns `Ok`, the source emits [`CaptureEvent`]s into
///   the channel it was constructed with, until `stop()` is called.
/// - `start()` requests platform permission on first use and fails with
///   [`CaptureError::PermissionDenied`] when it is refused.
/// - `stop()` is idempotent and never fails.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Activate continuous capture.
    async fn start(&self) -> Result<(), CaptureError>;

    /// Deactivate capture.  Events already in flight may still be queued;
    /// the scheduler discards anything that arrives while suspended.
    async fn stop(&self);
}

// Compile-time assertion: Box<dyn CaptureSource> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn CaptureSource>) {}
};

// ---------------------------------------------------------------------------
// TypedCapture
// ---------------------------------------------------------------------------

/// Terminal capture backend: typed lines stand in for speech.
///
/// The binary feeds every non-command input line to [`feed`](Self::feed);
/// lines are forwarded as [`CaptureEvent::Interim`] only while the source
/// is active, mirroring a recogniser that is simply not running while the
/// assistant speaks.
pub struct TypedCapture {
    events: mpsc::Sender<CaptureEvent>,
    active: AtomicBool,
}

impl TypedCapture {
    /// Create a typed capture source that emits into `events`.
    pub fn new(events: mpsc::Sender<CaptureEvent>) -> Self {
        Self {
            events,
            active: AtomicBool::new(false),
        }
    }

    /// Returns `true` while the source is forwarding input.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Offer one line of typed input.  Dropped silently while inactive.
    pub async fn feed(&self, line: &str) {
        if !self.is_active() {
            log::debug!("capture: inactive, dropping input");
            return;
        }
        if self
            .events
            .send(CaptureEvent::Interim(line.to_string()))
            .await
            .is_err()
        {
            log::warn!("capture: event channel closed");
        }
    }
}

#[async_trait]
impl CaptureSource for TypedCapture {
    async fn start(&self) -> Result<(), CaptureError> {
        self.active.store(true, Ordering::SeqCst);
        log::debug!("capture: typed capture active");
        Ok(())
    }

    async fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        log::debug!("capture: typed capture stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
