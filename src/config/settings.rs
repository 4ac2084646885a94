//! User preference structs, defaults and TOML persistence.
//!
//! [`Preferences`] is loaded once at session start and handed to the
//! scheduler as an explicit session context — components never reach into
//! ambient global state.  Mutation happens only through the explicit
//! setter methods, which also enforce the documented value ranges.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Minimum allowed post-speech cooldown, in seconds.
pub const COOLDOWN_MIN_SECS: u64 = 1;
/// Maximum allowed post-speech cooldown, in seconds.
pub const COOLDOWN_MAX_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Settings for speech capture and end-of-utterance detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Recognition language as a BCP-47 tag (e.g. `"en-US"`).
    pub language: String,
    /// Milliseconds without a new interim transcript before the current
    /// utterance is finalized.
    pub quiet_window_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            language: "en-US".into(),
            quiet_window_ms: 1_500,
        }
    }
}

// ---------------------------------------------------------------------------
// ResponderConfig
// ---------------------------------------------------------------------------

/// Settings for the remote intent responder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Base URL of the responder service.  The dispatcher appends
    /// `/api/voice-assistant`.
    pub base_url: String,
    /// Maximum seconds to wait for a reply before timing out.
    pub timeout_secs: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for speech output.
///
/// Remote synthesis is attempted only when `use_remote` is set **and** an
/// API key is present; every other combination (and every remote failure)
/// uses the local platform synthesiser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Prefer the remote TTS provider over local synthesis.
    pub use_remote: bool,
    /// Remote provider API key — `None` until the user supplies one.
    pub api_key: Option<String>,
    /// Voice identifier.  `"default"` resolves to the provider's default
    /// voice; other values are provider voice ids from the catalogue.
    pub voice_id: String,
    /// Remote synthesis model id.
    pub model_id: String,
    /// Voice stability setting (0.0 – 1.0).
    pub stability: f32,
    /// Voice similarity-boost setting (0.0 – 1.0).
    pub similarity_boost: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            use_remote: false,
            api_key: None,
            voice_id: "default".into(),
            model_id: "eleven_multilingual_v2".into(),
            stability: 0.5,
            similarity_boost: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// AlertConfig
// ---------------------------------------------------------------------------

/// Settings for the emergency alert endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Full URL of the emergency endpoint.  `None` disables the feature.
    pub endpoint: Option<String>,
}

// ---------------------------------------------------------------------------
// Preferences  (top-level)
// ---------------------------------------------------------------------------

/// Top-level user preferences, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use sahaay_voice::config::Preferences;
///
/// // Load (returns Default when the file is missing)
/// let mut prefs = Preferences::load().unwrap();
///
/// prefs.set_cooldown_secs(3);
/// prefs.save().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Registered user name, used to personalise the welcome message and
    /// fallback replies.  `None` before registration.
    pub user_name: Option<String>,
    /// Seconds to wait after speech output before capture resumes.
    /// Clamped to `[COOLDOWN_MIN_SECS, COOLDOWN_MAX_SECS]` on load and on
    /// every mutation.
    pub cooldown_secs: u64,
    /// Globally mute speech output.  Responses are still written to the
    /// chat log while muted.
    pub muted: bool,
    /// Speech capture settings.
    pub capture: CaptureConfig,
    /// Intent responder settings.
    pub responder: ResponderConfig,
    /// Speech output settings.
    pub tts: TtsConfig,
    /// Emergency alert settings.
    pub alert: AlertConfig,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            user_name: None,
            cooldown_secs: 5,
            muted: false,
            capture: CaptureConfig::default(),
            responder: ResponderConfig::default(),
            tts: TtsConfig::default(),
            alert: AlertConfig::default(),
        }
    }
}

impl Preferences {
    /// Load preferences from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(Preferences::default())` when the file does not exist
    /// yet (first-run scenario) so callers never need to special-case a
    /// missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut prefs: Self = toml::from_str(&content)?;
        prefs.clamp_ranges();
        Ok(prefs)
    }

    /// Save preferences to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns `true` when no `settings.toml` exists yet — first-run
    /// detection used by the registration prompt.
    pub fn is_first_run() -> bool {
        !AppPaths::new().settings_file.exists()
    }

    // -----------------------------------------------------------------------
    // Explicit mutation methods
    // -----------------------------------------------------------------------

    /// Set the post-speech cooldown, clamped to the allowed range.
    pub fn set_cooldown_secs(&mut self, secs: u64) {
        self.cooldown_secs = secs.clamp(COOLDOWN_MIN_SECS, COOLDOWN_MAX_SECS);
    }

    /// Select a voice from the catalogue.  Picking any voice implies the
    /// user wants remote synthesis.
    pub fn select_voice(&mut self, voice_id: impl Into<String>) {
        self.tts.voice_id = voice_id.into();
        self.tts.use_remote = true;
    }

    /// Store the remote TTS API key and enable remote synthesis.
    pub fn set_tts_api_key(&mut self, key: impl Into<String>) {
        self.tts.api_key = Some(key.into());
        self.tts.use_remote = true;
    }

    /// Flip the global mute flag and return the new value.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    /// Force out-of-range values back into their documented ranges.
    fn clamp_ranges(&mut self) {
        self.cooldown_secs = self
            .cooldown_secs
            .clamp(COOLDOWN_MIN_SECS, COOLDOWN_MAX_SECS);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
