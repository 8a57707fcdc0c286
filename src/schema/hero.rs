use serde::{Deserialize, Serialize};

/// Newtype wrapper for hero IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeroId(pub String);

impl From<&str> for HeroId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for HeroId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a hero comes from, which decides whether it is playable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeroKind {
    /// Always playable.
    Preset,
    /// Playable once a card referencing it has been drawn and chosen.
    Unlockable,
    /// Built from an uploaded photo during onboarding.
    Custom,
}

/// A protagonist or companion.
///
/// Heroes are immutable once created; sessions refer to catalog heroes by
/// id and only carry the protagonist itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hero {
    pub id: HeroId,
    pub name: String,
    /// Power label shown to the reader.
    pub power: String,
    /// Trait instruction handed to the content generator.
    pub ai_instruction: String,
    /// Portrait image handle, also used as the illustration reference.
    pub portrait: String,
    #[serde(default)]
    pub emoji: String,
    /// Visual description used to keep illustrations consistent.
    #[serde(default)]
    pub appearance: Option<String>,
    pub kind: HeroKind,
}

impl Hero {
    /// Returns true if the hero is gated behind an unlock card.
    pub fn is_locked_by_default(&self) -> bool {
        self.kind == HeroKind::Unlockable
    }

    /// Appearance text, or a neutral baseline when none is recorded.
    pub fn appearance_or_default(&self) -> &str {
        self.appearance.as_deref().unwrap_or("a young child")
    }
}
