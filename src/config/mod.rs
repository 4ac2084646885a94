//! Configuration module for the Sahaay voice assistant.
//!
//! Provides `Preferences` (the user preference record loaded once at
//! session start), `AppPaths` for cross-platform config directories, and
//! TOML persistence via `Preferences::load` / `Preferences::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AlertConfig, CaptureConfig, Preferences, ResponderConfig, TtsConfig, COOLDOWN_MAX_SECS,
    COOLDOWN_MIN_SECS,
};
