//! Turn-taking state machine.
//!
//! [`state`] holds the phases and the shared session snapshot; the
//! [`scheduler`] drives transitions between them.

pub mod scheduler;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use scheduler::{SessionCommand, TurnScheduler};
pub use state::{
    new_shared_session, personalised_welcome, ChatMessage, ChatRole, SessionState, SharedSession,
    TurnPhase, WELCOME_MESSAGE,
};
