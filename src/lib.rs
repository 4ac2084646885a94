//! Sahaay — a hands-free voice assistant session built around strict
//! turn-taking.
//!
//! The assistant alternates between listening and speaking so it never
//! hears its own output:
//!
//! ```text
//! ┌──────┐ start ┌───────────┐ quiet ┌────────────┐ reply ┌──────────┐
//! │ Idle │──────▶│ Listening │──────▶│ Processing │──────▶│ Speaking │
//! └──────┘       └───────────┘       └────────────┘       └──────────┘
//!     ▲                ▲                                        │
//!     │ stop           │ cooldown elapsed   ┌──────────┐  done  │
//!     └────────────────┴────────────────────│ Cooldown │◀───────┘
//!                                           └──────────┘
//! ```
//!
//! Module map:
//!
//! * [`capture`]  — speech capture seam and the typed-input backend.
//! * [`finalize`] — debounce of interim transcripts into utterances.
//! * [`dispatch`] — fail-soft HTTP intent dispatch.
//! * [`speech`]   — remote TTS, audio playback, local fallback.
//! * [`turn`]     — the phase state machine and scheduler.
//! * [`session`]  — wiring that spawns a complete session.
//! * [`alert`]    — out-of-band emergency notification.
//! * [`voices`]   — the built-in remote voice catalogue.
//! * [`config`]   — persisted user preferences.

pub mod alert;
pub mod capture;
pub mod config;
pub mod dispatch;
pub mod finalize;
pub mod session;
pub mod speech;
pub mod turn;
pub mod voices;
