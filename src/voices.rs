//! Voice catalogue for remote speech synthesis.
//!
//! A static table of the provider voices the assistant offers, split into
//! the stock assistant voices and the celebrity-style ones.  Selecting any
//! catalogue voice implies remote synthesis (see
//! [`crate::config::Preferences::select_voice`]).

// ---------------------------------------------------------------------------
// VoiceCategory
// ---------------------------------------------------------------------------

/// Grouping used when presenting the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceCategory {
    /// Stock assistant voices.
    Default,
    /// Celebrity-style voices.
    Celebrity,
}

// ---------------------------------------------------------------------------
// VoiceInfo
// ---------------------------------------------------------------------------

/// Static metadata for a single synthesis voice.
#[derive(Debug)]
pub struct VoiceInfo {
    /// Provider voice id, or `"default"` for the provider default.
    pub id: &'static str,
    /// Human-readable display name.
    pub name: &'static str,
    /// Short description shown next to the name.
    pub description: &'static str,
    /// Catalogue grouping.
    pub category: VoiceCategory,
}

/// All voices the assistant offers.
pub const VOICE_CATALOGUE: &[VoiceInfo] = &[
    VoiceInfo {
        id: "default",
        name: "Default",
        description: "Default assistant voice",
        category: VoiceCategory::Default,
    },
    VoiceInfo {
        id: "CwhRBWXzGAHq8TQ4Fs17",
        name: "Roger",
        description: "Deep male voice",
        category: VoiceCategory::Default,
    },
    VoiceInfo {
        id: "EXAVITQu4vr4xnSDxMaL",
        name: "Sarah",
        description: "Friendly female voice",
        category: VoiceCategory::Default,
    },
    VoiceInfo {
        id: "FGY2WhTYpPnrIDTdsKH5",
        name: "Laura",
        description: "Warm female voice",
        category: VoiceCategory::Default,
    },
    VoiceInfo {
        id: "JBFqnCBsd6RMkjVDRZzb",
        name: "George",
        description: "Deep authoritative voice",
        category: VoiceCategory::Celebrity,
    },
    VoiceInfo {
        id: "pFZP5JQG7iQjIQuC4Bku",
        name: "Lily",
        description: "Clear British accent",
        category: VoiceCategory::Celebrity,
    },
    VoiceInfo {
        id: "TX3LPaxmHKxFdv7VOQHJ",
        name: "Liam",
        description: "British male voice",
        category: VoiceCategory::Celebrity,
    },
    VoiceInfo {
        id: "XB0fDUnXU5powFXDhCwa",
        name: "Charlotte",
        description: "Warm female voice",
        category: VoiceCategory::Celebrity,
    },
];

/// Look up a catalogue voice by id.
pub fn find_voice_by_id(id: &str) -> Option<&'static VoiceInfo> {
    VOICE_CATALOGUE.iter().find(|v| v.id == id)
}

/// All catalogue voices in the given category.
pub fn voices_in_category(category: VoiceCategory) -> impl Iterator<Item = &'static VoiceInfo> {
    VOICE_CATALOGUE.iter().filter(move |v| v.category == category)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_known_voice() {
        let voice = find_voice_by_id("EXAVITQu4vr4xnSDxMaL").expect("Sarah exists");
        assert_eq!(voice.name, "Sarah");
        assert_eq!(voice.category, VoiceCategory::Default);
    }

    #[test]
    fn find_unknown_voice_returns_none() {
        assert!(find_voice_by_id("no-such-voice").is_none());
    }

    #[test]
    fn catalogue_contains_the_default_voice() {
        let voice = find_voice_by_id("default").expect("default exists");
        assert_eq!(voice.name, "Default");
    }

    #[test]
    fn voice_ids_are_unique() {
        for (i, a) in VOICE_CATALOGUE.iter().enumerate() {
            for b in &VOICE_CATALOGUE[i + 1..] {
                assert_ne!(a.id, b.id, "duplicate voice id {}", a.id);
            }
        }
    }

    #[test]
    fn both_categories_are_populated() {
        assert!(voices_in_category(VoiceCategory::Default).count() >= 1);
        assert!(voices_in_category(VoiceCategory::Celebrity).count() >= 1);
    }
}
