//! Turn state machine phases and shared session state.
//!
//! [`TurnPhase`] drives the scheduler's state machine.  UI layers read it
//! via [`SharedSession`] to render the appropriate view.
//!
//! [`SessionState`] is the single source of truth for everything a UI
//! needs: current phase, the append-only chat log, the last assistant
//! response, and any user-visible error message.
//!
//! [`SharedSession`] is a type alias for `Arc<Mutex<SessionState>>` —
//! cheap to clone and safe to share across tasks.

use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// TurnPhase
// ---------------------------------------------------------------------------

/// Phases of the voice turn-taking cycle.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──user start──▶ Listening
///        ──utterance finalized──▶ Processing   (capture suspended)
///                                 ──responder replied──▶ Speaking
///                                 ──playback ended─────▶ Cooldown
///        ◀──cooldown elapsed / user resume────────────── Cooldown
/// any state ──user stop──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// No session activity; waiting for the user to start the assistant.
    Idle,

    /// Capture is active; interim transcripts are being accepted.
    Listening,

    /// An utterance was finalized; the remote responder is being queried.
    /// Capture is suspended so the assistant cannot hear itself.
    Processing,

    /// The response is being rendered as speech.
    Speaking,

    /// Grace period after speech output before capture resumes, so
    /// ambient noise right after playback does not re-trigger a turn.
    Cooldown,
}

impl TurnPhase {
    /// Returns `true` exactly when speech capture must be active.
    ///
    /// ```
    /// use sahaay_voice::turn::TurnPhase;
    ///
    /// assert!(TurnPhase::Listening.is_capturing());
    /// assert!(!TurnPhase::Processing.is_capturing());
    /// assert!(!TurnPhase::Speaking.is_capturing());
    /// assert!(!TurnPhase::Cooldown.is_capturing());
    /// assert!(!TurnPhase::Idle.is_capturing());
    /// ```
    pub fn is_capturing(&self) -> bool {
        matches!(self, TurnPhase::Listening)
    }

    /// A short human-readable label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            TurnPhase::Idle => "Idle",
            TurnPhase::Listening => "Listening",
            TurnPhase::Processing => "Thinking",
            TurnPhase::Speaking => "Speaking",
            TurnPhase::Cooldown => "Taking a moment",
        }
    }
}

impl Default for TurnPhase {
    fn default() -> Self {
        TurnPhase::Idle
    }
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

/// Who said a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// One entry of the append-only chat transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    /// A message spoken by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    /// A message spoken by the assistant.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Greeting seeded into the chat log when a session opens.
pub const WELCOME_MESSAGE: &str =
    "Hello! I'm Sahaay, your personal assistant. How can I help you today?";

/// Personalise the welcome greeting with the registered user name.
pub fn personalised_welcome(user_name: Option<&str>) -> String {
    match user_name {
        Some(name) if !name.is_empty() => {
            WELCOME_MESSAGE.replace("Hello!", &format!("Hello, {name}!"))
        }
        _ => WELCOME_MESSAGE.to_string(),
    }
}

/// Shared session state — the single source of truth for UI layers.
///
/// Held behind [`SharedSession`].  The scheduler mutates it; readers poll
/// or snapshot it.  Do **not** hold the lock across `.await` points.
pub struct SessionState {
    /// Current phase of the turn cycle.
    pub phase: TurnPhase,

    /// Append-only chat transcript, seeded with the welcome message.
    pub chat: Vec<ChatMessage>,

    /// Text of the most recent assistant message.
    pub last_response: Option<String>,

    /// User-visible error (capture permission, unsupported platform).
    /// `None` while everything is healthy.
    pub error_message: Option<String>,
}

impl SessionState {
    /// Create session state seeded with a (possibly personalised) welcome.
    pub fn new(user_name: Option<&str>) -> Self {
        let welcome = personalised_welcome(user_name);
        Self {
            phase: TurnPhase::Idle,
            chat: vec![ChatMessage::assistant(welcome.clone())],
            last_response: Some(welcome),
            error_message: None,
        }
    }

    /// Append a message to the chat log, tracking the last response.
    pub fn push_message(&mut self, message: ChatMessage) {
        if message.role == ChatRole::Assistant {
            self.last_response = Some(message.text.clone());
        }
        self.chat.push(message);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(None)
    }
}

// ---------------------------------------------------------------------------
// SharedSession
// ---------------------------------------------------------------------------

/// Task-safe handle to [`SessionState`].
///
/// Cheap to clone (`Arc` clone).  Lock with `.lock().unwrap()` for a short
/// critical section only.
pub type SharedSession = Arc<Mutex<SessionState>>;

/// Construct a new [`SharedSession`] seeded for the given user.
pub fn new_shared_session(user_name: Option<&str>) -> SharedSession {
    Arc::new(Mutex::new(SessionState::new(user_name)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
