//! Turn scheduler — drives the listen → process → speak → cooldown cycle.
//!
//! [`TurnScheduler`] owns the [`SharedSession`] and serializes all turn
//! activity: it is the only component allowed to start/stop the capture
//! source, and at most one turn is ever mid-flight.
//!
//! # Turn flow
//!
//! ```text
//! SessionCommand::Start
//!   └─▶ capture.start(), phase = Listening
//!
//! Utterance finalized (while Listening)
//!   └─▶ capture.stop(), phase = Processing     ── the assistant must not
//!         └─▶ dispatcher.dispatch (fail-soft)     hear its own voice
//!               └─▶ phase = Speaking, renderer.render
//!                     └─▶ phase = Cooldown, sleep(cooldown_secs)
//!                           └─▶ drain stale events, capture.start(),
//!                               phase = Listening
//! ```
//!
//! `Stop` is honoured at every await point: it drops an in-flight
//! dispatch/render future, cancels a pending cooldown timer, deactivates
//! capture, discards any transcript still buffered in the finalizer, and
//! returns to `Idle`.  Settings commands (`SetCooldown`,
//! `ToggleMute`) never cancel a turn; while one is mid-flight they are
//! deferred until the current await completes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::capture::{CaptureEvent, CaptureSource};
use crate::config::Preferences;
use crate::dispatch::Dispatcher;
use crate::finalize::{FinalizerInput, Utterance};
use crate::speech::SpeechRenderer;

use super::state::{ChatMessage, SharedSession, TurnPhase};

// ---------------------------------------------------------------------------
// SessionCommand
// ---------------------------------------------------------------------------

/// User actions accepted by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Start (or resume) listening.  Ignored while a turn is mid-flight;
    /// during `Cooldown` it ends the wait early.
    Start,

    /// Stop the session from any state and return to `Idle`.
    Stop,

    /// Update the post-speech cooldown (seconds, clamped to 1–10).
    SetCooldown(u64),

    /// Flip the global output mute.  Muted turns still run; responses are
    /// logged to the chat but not spoken.
    ToggleMute,
}

// ---------------------------------------------------------------------------
// Flight
// ---------------------------------------------------------------------------

/// Outcome of racing an in-flight operation against a user stop.
enum Flight<T> {
    Done(T),
    Stopped,
}

/// Await `work`, but resolve early when the user issues `Stop` (or the
/// command channel closes).  Settings commands received meanwhile are
/// collected into `deferred` instead of interrupting the flight.
async fn race_with_stop<F>(
    work: F,
    commands: &mut mpsc::Receiver<SessionCommand>,
    deferred: &mut Vec<SessionCommand>,
) -> Flight<F::Output>
where
    F: std::future::Future,
{
    tokio::pin!(work);
    loop {
        tokio::select! {
            out = &mut work => return Flight::Done(out),
            cmd = commands.recv() => match cmd {
                Some(SessionCommand::Stop) | None => return Flight::Stopped,
                Some(other) => deferred.push(other),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TurnScheduler
// ---------------------------------------------------------------------------

/// Drives the complete voice turn-taking cycle.
///
/// Create with [`TurnScheduler::new`], then call [`run`](Self::run) inside
/// a tokio task.  `run` returns when the command channel closes.
pub struct TurnScheduler {
    session: SharedSession,
    capture: Arc<dyn CaptureSource>,
    dispatcher: Dispatcher,
    renderer: SpeechRenderer,
    prefs: Preferences,
    finalizer: mpsc::Sender<FinalizerInput>,
}

impl TurnScheduler {
    /// Create a new scheduler.
    ///
    /// # Arguments
    ///
    /// * `session`    — shared session state (also read by the UI).
    /// * `capture`    — exclusive capture handle; only the scheduler may
    ///                  start/stop it.
    /// * `dispatcher` — fail-soft intent dispatcher.
    /// * `renderer`   — fail-soft speech renderer.
    /// * `prefs`      — session preferences, loaded once at start.
    /// * `finalizer`  — input side of the utterance finalizer; the
    ///                  scheduler gates interim transcripts through it and
    ///                  resets it on stop/restart.
    pub fn new(
        session: SharedSession,
        capture: Arc<dyn CaptureSource>,
        dispatcher: Dispatcher,
        renderer: SpeechRenderer,
        prefs: Preferences,
        finalizer: mpsc::Sender<FinalizerInput>,
    ) -> Self {
        Self {
            session,
            capture,
            dispatcher,
            renderer,
            prefs,
            finalizer,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the scheduler until `commands` is closed.
    ///
    /// * `commands`       — user actions.
    /// * `capture_events` — interim transcripts / engine-end events from
    ///                      the capture source.
    /// * `utterances`     — finalized utterances from the finalizer.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut capture_events: mpsc::Receiver<CaptureEvent>,
        mut utterances: mpsc::Receiver<Utterance>,
    ) {
        loop {
            tokio::select! {
                maybe = commands.recv() => match maybe {
                    Some(SessionCommand::Start) => {
                        self.handle_start(&mut capture_events, &mut utterances).await;
                    }
                    Some(SessionCommand::Stop) => self.enter_idle().await,
                    Some(setting) => self.apply_setting(setting),
                    None => break,
                },
                Some(event) = capture_events.recv() => {
                    self.handle_capture_event(event).await;
                }
                Some(utterance) = utterances.recv() => {
                    if self.phase() == TurnPhase::Listening {
                        self.run_turn(
                            utterance,
                            &mut commands,
                            &mut capture_events,
                            &mut utterances,
                        )
                        .await;
                    } else {
                        log::debug!("scheduler: discarding stale utterance {:?}", utterance.text);
                    }
                }
            }
        }

        self.capture.stop().await;
        log::info!("scheduler: command channel closed, shutting down");
    }

    // -----------------------------------------------------------------------
    // Command handling
    // -----------------------------------------------------------------------

    /// Handle a user start/resume from the main loop (phase is never
    /// `Cooldown` here — cooldown waits handle `Start` themselves).
    async fn handle_start(
        &mut self,
        capture_events: &mut mpsc::Receiver<CaptureEvent>,
        utterances: &mut mpsc::Receiver<Utterance>,
    ) {
        if self.phase() != TurnPhase::Idle {
            log::debug!("scheduler: start ignored, session already active");
            return;
        }
        self.begin_listening(capture_events, utterances).await;
    }

    /// Apply a settings command.  Safe in any phase.
    fn apply_setting(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SetCooldown(secs) => {
                self.prefs.set_cooldown_secs(secs);
                log::info!(
                    "scheduler: cooldown set to {}s",
                    self.prefs.cooldown_secs
                );
            }
            SessionCommand::ToggleMute => {
                let muted = self.prefs.toggle_mute();
                log::info!("scheduler: output {}", if muted { "muted" } else { "unmuted" });
            }
            SessionCommand::Start => {
                // A Start deferred from mid-flight; the turn it raced is
                // already resolving the phase, nothing left to do.
                log::debug!("scheduler: deferred start ignored");
            }
            SessionCommand::Stop => unreachable!("Stop is handled before apply_setting"),
        }
    }

    // -----------------------------------------------------------------------
    // Capture events
    // -----------------------------------------------------------------------

    /// Forward interim transcripts to the finalizer while `Listening`;
    /// restart a capture engine that ended on its own, but only while the
    /// scheduler still wants to listen (no restart storms during
    /// cooldown or speaking).
    async fn handle_capture_event(&mut self, event: CaptureEvent) {
        match event {
            CaptureEvent::Interim(text) => {
                if self.phase() != TurnPhase::Listening {
                    log::debug!("scheduler: dropping interim while suspended");
                    return;
                }
                if self
                    .finalizer
                    .send(FinalizerInput::Interim(text))
                    .await
                    .is_err()
                {
                    log::warn!("scheduler: finalizer channel closed");
                }
            }
            CaptureEvent::Ended => {
                if self.phase() != TurnPhase::Listening {
                    return;
                }
                log::warn!("scheduler: capture ended unexpectedly, restarting");
                if let Err(e) = self.capture.start().await {
                    self.fail_capture(&e.to_string());
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Turn execution
    // -----------------------------------------------------------------------

    /// Run one full turn: suspend capture, dispatch, speak, cool down,
    /// resume.  Returns early (to `Idle`) when the user stops mid-flight.
    async fn run_turn(
        &mut self,
        utterance: Utterance,
        commands: &mut mpsc::Receiver<SessionCommand>,
        capture_events: &mut mpsc::Receiver<CaptureEvent>,
        utterances: &mut mpsc::Receiver<Utterance>,
    ) {
        log::debug!("scheduler: turn started for {:?}", utterance.text);

        // ── 1. Suspend capture and record the user's words ───────────────
        self.set_phase(TurnPhase::Processing);
        self.capture.stop().await;
        self.session
            .lock()
            .unwrap()
            .push_message(ChatMessage::user(utterance.text.clone()));

        let mut deferred: Vec<SessionCommand> = Vec::new();

        // ── 2. Dispatch (fail-soft: always yields a reply) ───────────────
        let reply = {
            let dispatch = self.dispatcher.dispatch(&utterance);
            match race_with_stop(dispatch, commands, &mut deferred).await {
                Flight::Done(reply) => reply,
                Flight::Stopped => {
                    self.abort_turn(deferred).await;
                    return;
                }
            }
        };
        self.apply_deferred(&mut deferred);

        // ── 3. Speak the reply ───────────────────────────────────────────
        self.session
            .lock()
            .unwrap()
            .push_message(ChatMessage::assistant(reply.clone()));
        self.set_phase(TurnPhase::Speaking);

        {
            let render = self
                .renderer
                .render(&reply, &self.prefs.tts, self.prefs.muted);
            match race_with_stop(render, commands, &mut deferred).await {
                Flight::Done(path) => log::debug!("scheduler: spoke reply via {path:?}"),
                Flight::Stopped => {
                    self.abort_turn(deferred).await;
                    return;
                }
            }
        }
        self.apply_deferred(&mut deferred);

        // ── 4. Cooldown ──────────────────────────────────────────────────
        self.set_phase(TurnPhase::Cooldown);
        let cooldown = Duration::from_secs(self.prefs.cooldown_secs);
        log::info!(
            "scheduler: taking a moment, listening again in {}s",
            cooldown.as_secs()
        );

        let wait = tokio::time::sleep(cooldown);
        tokio::pin!(wait);
        let resume = loop {
            tokio::select! {
                () = &mut wait => break true,
                cmd = commands.recv() => match cmd {
                    Some(SessionCommand::Stop) | None => break false,
                    Some(SessionCommand::Start) => break true,
                    Some(setting) => self.apply_setting(setting),
                }
            }
        };

        if !resume {
            self.enter_idle().await;
            return;
        }

        // ── 5. Resume listening ──────────────────────────────────────────
        self.begin_listening(capture_events, utterances).await;
    }

    /// Tear down a turn the user cancelled mid-flight.
    async fn abort_turn(&mut self, deferred: Vec<SessionCommand>) {
        log::debug!("scheduler: turn cancelled by user stop");
        for setting in deferred {
            if setting != SessionCommand::Start {
                self.apply_setting(setting);
            }
        }
        self.enter_idle().await;
    }

    fn apply_deferred(&mut self, deferred: &mut Vec<SessionCommand>) {
        for setting in deferred.drain(..) {
            self.apply_setting(setting);
        }
    }

    // -----------------------------------------------------------------------
    // Phase transitions
    // -----------------------------------------------------------------------

    /// Activate capture and enter `Listening`; capture failures are
    /// user-visible and leave the session in `Idle`.
    ///
    /// Anything captured or finalized before this point is stale — a turn
    /// must only ever start from speech heard inside the new listening
    /// window.  The finalizer is reset and both event queues are drained
    /// before capture comes back up.
    async fn begin_listening(
        &mut self,
        capture_events: &mut mpsc::Receiver<CaptureEvent>,
        utterances: &mut mpsc::Receiver<Utterance>,
    ) {
        if self.finalizer.send(FinalizerInput::Reset).await.is_err() {
            log::warn!("scheduler: finalizer channel closed");
        }
        while capture_events.try_recv().is_ok() {}
        while utterances.try_recv().is_ok() {}

        match self.capture.start().await {
            Ok(()) => {
                let mut session = self.session.lock().unwrap();
                session.phase = TurnPhase::Listening;
                session.error_message = None;
                log::info!("scheduler: listening");
            }
            Err(e) => self.fail_capture(&e.to_string()),
        }
    }

    /// Deactivate capture and return to `Idle`.
    ///
    /// Resets the finalizer as well: a transcript buffered before the stop
    /// must not finalize into a turn after a later restart.
    async fn enter_idle(&mut self) {
        self.capture.stop().await;
        let _ = self.finalizer.send(FinalizerInput::Reset).await;
        self.set_phase(TurnPhase::Idle);
        log::info!("scheduler: session idle");
    }

    fn phase(&self) -> TurnPhase {
        self.session.lock().unwrap().phase
    }

    fn set_phase(&self, phase: TurnPhase) {
        self.session.lock().unwrap().phase = phase;
    }

    fn fail_capture(&self, message: &str) {
        let mut session = self.session.lock().unwrap();
        session.phase = TurnPhase::Idle;
        session.error_message = Some(message.to_string());
        log::error!("scheduler: capture unavailable: {message}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureError;
    use crate::dispatch::{IntentResponder, ResponderError};
    use crate::finalize::UtteranceFinalizer;
    use crate::speech::{AudioSink, LocalSpeech, PlaybackError, TtsBackend, TtsError};
    use crate::turn::state::{new_shared_session, ChatRole};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Capture fake that records start/stop calls and lets tests inject
    /// recognition events.
    struct ScriptedCapture {
        events: mpsc::Sender<CaptureEvent>,
        starts: AtomicUsize,
        active: AtomicBool,
        fail_with: Mutex<Option<CaptureError>>,
    }

    impl ScriptedCapture {
        fn new(events: mpsc::Sender<CaptureEvent>) -> Arc<Self> {
            Arc::new(Self {
                events,
                starts: AtomicUsize::new(0),
                active: AtomicBool::new(false),
                fail_with: Mutex::new(None),
            })
        }

        fn failing(events: mpsc::Sender<CaptureEvent>, err: CaptureError) -> Arc<Self> {
            let capture = Self::new(events);
            *capture.fail_with.lock().unwrap() = Some(err);
            capture
        }

        async fn interim(&self, text: &str) {
            let _ = self.events.send(CaptureEvent::Interim(text.into())).await;
        }

        async fn ended(&self) {
            let _ = self.events.send(CaptureEvent::Ended).await;
        }

        fn starts(&self) -> usize {
            self.starts.load(Ordering::SeqCst)
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CaptureSource for ScriptedCapture {
        async fn start(&self) -> Result<(), CaptureError> {
            if let Some(err) = self.fail_with.lock().unwrap().clone() {
                return Err(err);
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.active.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) {
            self.active.store(false, Ordering::SeqCst);
        }
    }

    /// Responder that replies instantly with a fixed string.
    struct OkResponder(String);

    #[async_trait]
    impl IntentResponder for OkResponder {
        async fn respond(&self, _prompt: &str) -> Result<String, ResponderError> {
            Ok(self.0.clone())
        }
    }

    /// Responder that always fails with a transport error.
    struct DownResponder;

    #[async_trait]
    impl IntentResponder for DownResponder {
        async fn respond(&self, _prompt: &str) -> Result<String, ResponderError> {
            Err(ResponderError::Request("connection refused".into()))
        }
    }

    /// Responder that takes a (virtual) while before replying.
    struct SlowResponder(Duration, String);

    #[async_trait]
    impl IntentResponder for SlowResponder {
        async fn respond(&self, _prompt: &str) -> Result<String, ResponderError> {
            tokio::time::sleep(self.0).await;
            Ok(self.1.clone())
        }
    }

    /// Responder that never replies — used to park a turn in Processing.
    struct NeverResponder;

    #[async_trait]
    impl IntentResponder for NeverResponder {
        async fn respond(&self, _prompt: &str) -> Result<String, ResponderError> {
            std::future::pending().await
        }
    }

    /// Instant audio sink.
    struct InstantSink;

    #[async_trait]
    impl AudioSink for InstantSink {
        async fn play(&self, _audio: Vec<u8>) -> Result<(), PlaybackError> {
            Ok(())
        }
    }

    /// Local speech fake that counts completed calls; optionally takes a
    /// (virtual) while per call so tests can park a turn in Speaking.
    struct CountingLocal {
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl CountingLocal {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay: Some(delay),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LocalSpeech for CountingLocal {
        async fn speak(&self, _text: &str) -> Result<(), PlaybackError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Remote TTS fake returning a tiny payload.
    struct FakeTts;

    #[async_trait]
    impl TtsBackend for FakeTts {
        async fn synthesize(&self, _text: &str, _voice: &str) -> Result<Vec<u8>, TtsError> {
            Ok(vec![0u8; 4])
        }
    }

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    struct Harness {
        commands: mpsc::Sender<SessionCommand>,
        capture: Arc<ScriptedCapture>,
        session: SharedSession,
        local: Arc<CountingLocal>,
    }

    fn spawn_scheduler(prefs: Preferences, responder: Arc<dyn IntentResponder>) -> Harness {
        spawn_scheduler_with(prefs, responder, None, CountingLocal::new())
    }

    fn spawn_scheduler_with(
        prefs: Preferences,
        responder: Arc<dyn IntentResponder>,
        failing_capture: Option<CaptureError>,
        local: Arc<CountingLocal>,
    ) -> Harness {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (capture_tx, capture_rx) = mpsc::channel(32);
        let (interim_tx, interim_rx) = mpsc::channel(32);
        let (utterance_tx, utterance_rx) = mpsc::channel(8);

        let capture = match failing_capture {
            Some(err) => ScriptedCapture::failing(capture_tx, err),
            None => ScriptedCapture::new(capture_tx),
        };

        let session = new_shared_session(prefs.user_name.as_deref());

        let quiet = Duration::from_millis(prefs.capture.quiet_window_ms);
        tokio::spawn(UtteranceFinalizer::new(quiet).run(interim_rx, utterance_tx));

        let renderer = SpeechRenderer::new(
            Some(Arc::new(FakeTts) as Arc<dyn TtsBackend>),
            Arc::new(InstantSink),
            Arc::clone(&local) as Arc<dyn LocalSpeech>,
        );
        let dispatcher = Dispatcher::new(responder, prefs.user_name.clone());

        let scheduler = TurnScheduler::new(
            Arc::clone(&session),
            Arc::clone(&capture) as Arc<dyn CaptureSource>,
            dispatcher,
            renderer,
            prefs,
            interim_tx,
        );
        tokio::spawn(scheduler.run(command_rx, capture_rx, utterance_rx));

        Harness {
            commands: command_tx,
            capture,
            session,
            local,
        }
    }

    async fn wait_for_phase(session: &SharedSession, phase: TurnPhase) {
        tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                if session.lock().unwrap().phase == phase {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {phase:?}"));
    }

    async fn wait_for_chat_len(session: &SharedSession, len: usize) {
        tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                if session.lock().unwrap().chat.len() >= len {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {len} chat messages"));
    }

    fn prefs_with_cooldown(secs: u64) -> Preferences {
        let mut prefs = Preferences::default();
        prefs.cooldown_secs = secs;
        prefs
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn start_command_begins_listening() {
        let h = spawn_scheduler(Preferences::default(), Arc::new(OkResponder("ok".into())));

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        assert_eq!(h.capture.starts(), 1);
        assert!(h.capture.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denied_sets_error_and_stays_idle() {
        let h = spawn_scheduler_with(
            Preferences::default(),
            Arc::new(OkResponder("ok".into())),
            Some(CaptureError::PermissionDenied),
            CountingLocal::new(),
        );

        h.commands.send(SessionCommand::Start).await.unwrap();

        tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                if h.session.lock().unwrap().error_message.is_some() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("error message never appeared");

        let session = h.session.lock().unwrap();
        assert_eq!(session.phase, TurnPhase::Idle);
        assert!(session
            .error_message
            .as_deref()
            .unwrap()
            .contains("Microphone"));
    }

    /// The end-to-end happy path from the design: spoken "hello" →
    /// responder reply → spoken → after the 3 s cooldown the scheduler
    /// re-enters Listening.
    #[tokio::test(start_paused = true)]
    async fn full_turn_cycle_returns_to_listening() {
        let h = spawn_scheduler(
            prefs_with_cooldown(3),
            Arc::new(OkResponder("Hello! How can I help you today?".into())),
        );

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        h.capture.interim("hello").await;

        // welcome + user + assistant
        wait_for_chat_len(&h.session, 3).await;
        {
            let session = h.session.lock().unwrap();
            assert_eq!(session.chat[1].role, ChatRole::User);
            assert_eq!(session.chat[1].text, "hello");
            assert_eq!(session.chat[2].role, ChatRole::Assistant);
            assert_eq!(session.chat[2].text, "Hello! How can I help you today?");
            assert_eq!(
                session.last_response.as_deref(),
                Some("Hello! How can I help you today?")
            );
        }

        wait_for_phase(&h.session, TurnPhase::Listening).await;
        assert_eq!(h.capture.starts(), 2, "capture resumed after cooldown");
    }

    /// While a turn is mid-flight the capture source must be inactive and
    /// interim transcripts must not produce a second utterance.
    #[tokio::test(start_paused = true)]
    async fn capture_is_suspended_while_processing() {
        let h = spawn_scheduler(
            prefs_with_cooldown(1),
            Arc::new(SlowResponder(Duration::from_secs(5), "done".into())),
        );

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        h.capture.interim("first question").await;
        wait_for_phase(&h.session, TurnPhase::Processing).await;
        assert!(!h.capture.is_active(), "capture must be stopped in Processing");

        // Playback noise picked up while suspended must be discarded.
        h.capture.interim("echo of my own voice").await;

        wait_for_chat_len(&h.session, 3).await;
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        // Give the stale interim every chance to (incorrectly) finalize.
        tokio::time::sleep(Duration::from_secs(5)).await;

        let session = h.session.lock().unwrap();
        let users = session
            .chat
            .iter()
            .filter(|m| m.role == ChatRole::User)
            .count();
        assert_eq!(users, 1, "suspended speech must never become a turn");
    }

    /// An unreachable responder still completes the turn through
    /// Speaking → Cooldown with the local apology.
    #[tokio::test(start_paused = true)]
    async fn responder_failure_still_completes_turn() {
        let h = spawn_scheduler(prefs_with_cooldown(2), Arc::new(DownResponder));

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        h.capture.interim("hello").await;
        wait_for_chat_len(&h.session, 3).await;

        {
            let session = h.session.lock().unwrap();
            assert_eq!(
                session.chat[2].text,
                "Something went wrong while trying to answer."
            );
        }

        // The turn must not wedge in Processing: it cools down and resumes.
        wait_for_phase(&h.session, TurnPhase::Listening).await;
        assert_eq!(h.capture.starts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_cooldown_cancels_resume() {
        let h = spawn_scheduler(
            prefs_with_cooldown(10),
            Arc::new(OkResponder("ok".into())),
        );

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        h.capture.interim("hello").await;
        wait_for_phase(&h.session, TurnPhase::Cooldown).await;

        h.commands.send(SessionCommand::Stop).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Idle).await;

        // Long after the cancelled timer would have fired, still Idle.
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(h.session.lock().unwrap().phase, TurnPhase::Idle);
        assert_eq!(h.capture.starts(), 1, "no spurious resume");
    }

    /// Speech heard before a manual stop must never become a turn, even
    /// when the session is restarted before its quiet window expires.
    #[tokio::test(start_paused = true)]
    async fn speech_before_a_stop_never_starts_a_turn() {
        let h = spawn_scheduler(Preferences::default(), Arc::new(OkResponder("ok".into())));

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        h.capture.interim("hello").await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        // Stop while the quiet window is still running, then restart.
        h.commands.send(SessionCommand::Stop).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Idle).await;

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        // Let the pre-stop window expire many times over.
        tokio::time::sleep(Duration::from_secs(10)).await;

        let session = h.session.lock().unwrap();
        let users = session
            .chat
            .iter()
            .filter(|m| m.role == ChatRole::User)
            .count();
        assert_eq!(
            users, 0,
            "speech from before a manual stop must not start a turn"
        );
        assert_eq!(session.phase, TurnPhase::Listening);
    }

    /// A stop mid-Speaking drops the render future; the cancelled speech
    /// must never complete afterwards.
    #[tokio::test(start_paused = true)]
    async fn stop_mid_speaking_cancels_playback() {
        let h = spawn_scheduler_with(
            prefs_with_cooldown(5),
            Arc::new(OkResponder("a very long answer".into())),
            None,
            CountingLocal::slow(Duration::from_secs(60)),
        );

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        h.capture.interim("hello").await;
        wait_for_phase(&h.session, TurnPhase::Speaking).await;

        h.commands.send(SessionCommand::Stop).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Idle).await;

        // Long after the cancelled speech would have finished.
        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(
            h.local.calls(),
            0,
            "a dropped render future must not finish speaking"
        );
        assert_eq!(h.session.lock().unwrap().phase, TurnPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_mid_dispatch_cancels_turn() {
        let h = spawn_scheduler(Preferences::default(), Arc::new(NeverResponder));

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        h.capture.interim("hello").await;
        wait_for_phase(&h.session, TurnPhase::Processing).await;

        h.commands.send(SessionCommand::Stop).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Idle).await;

        let session = h.session.lock().unwrap();
        // Welcome + the user's words; the cancelled dispatch must not
        // produce a late assistant message.
        assert_eq!(session.chat.len(), 2);
        assert!(!h.capture.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_honours_configured_duration() {
        let h = spawn_scheduler(prefs_with_cooldown(3), Arc::new(OkResponder("ok".into())));

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        h.capture.interim("hello").await;
        wait_for_phase(&h.session, TurnPhase::Cooldown).await;

        // Two seconds in (observed within 20 ms of entry) — still cooling.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.session.lock().unwrap().phase, TurnPhase::Cooldown);

        wait_for_phase(&h.session, TurnPhase::Listening).await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_during_cooldown_resumes_early() {
        let h = spawn_scheduler(
            prefs_with_cooldown(10),
            Arc::new(OkResponder("ok".into())),
        );

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        h.capture.interim("hello").await;
        wait_for_phase(&h.session, TurnPhase::Cooldown).await;

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        assert_eq!(h.capture.starts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_end_while_listening_self_heals() {
        let h = spawn_scheduler(Preferences::default(), Arc::new(OkResponder("ok".into())));

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;
        assert_eq!(h.capture.starts(), 1);

        h.capture.ended().await;

        tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                if h.capture.starts() == 2 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("capture was never restarted");

        assert_eq!(h.session.lock().unwrap().phase, TurnPhase::Listening);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_end_after_stop_does_not_restart() {
        let h = spawn_scheduler(Preferences::default(), Arc::new(OkResponder("ok".into())));

        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        h.commands.send(SessionCommand::Stop).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Idle).await;

        h.capture.ended().await;
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(h.capture.starts(), 1, "no restart after a manual stop");
        assert_eq!(h.session.lock().unwrap().phase, TurnPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn set_cooldown_applies_to_the_next_wait() {
        let h = spawn_scheduler(
            prefs_with_cooldown(10),
            Arc::new(OkResponder("ok".into())),
        );

        h.commands.send(SessionCommand::SetCooldown(1)).await.unwrap();
        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        h.capture.interim("hello").await;
        wait_for_phase(&h.session, TurnPhase::Cooldown).await;

        // With the 1 s override the resume fires well before the original
        // 10 s would have.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.session.lock().unwrap().phase, TurnPhase::Listening);
    }

    /// Muted sessions still log the assistant reply but never speak it.
    #[tokio::test(start_paused = true)]
    async fn muted_turn_logs_but_does_not_speak() {
        let mut prefs = prefs_with_cooldown(1);
        prefs.tts.use_remote = false;
        let h = spawn_scheduler(prefs, Arc::new(OkResponder("quiet reply".into())));

        h.commands.send(SessionCommand::ToggleMute).await.unwrap();
        h.commands.send(SessionCommand::Start).await.unwrap();
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        h.capture.interim("hello").await;
        wait_for_chat_len(&h.session, 3).await;
        wait_for_phase(&h.session, TurnPhase::Listening).await;

        assert_eq!(
            h.session.lock().unwrap().chat[2].text,
            "quiet reply",
            "reply is still recorded while muted"
        );
        assert_eq!(h.local.calls(), 0, "nothing was spoken");
    }
}
