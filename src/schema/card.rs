use serde::{Deserialize, Serialize};

use super::hero::HeroId;
use super::phase::Phase;
use super::world::WorldId;

/// Newtype wrapper for card IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub String);

impl From<&str> for CardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rarity tier of a destiny card, ascending in value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rarity {
    Silver,
    Gold,
    Platinum,
}

impl Rarity {
    pub const ALL: [Rarity; 3] = [Rarity::Silver, Rarity::Gold, Rarity::Platinum];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Silver => "SILVER",
            Self::Gold => "GOLD",
            Self::Platinum => "PLATINUM",
        }
    }

    pub fn parse(s: &str) -> Option<Rarity> {
        match s.to_ascii_uppercase().as_str() {
            "SILVER" => Some(Self::Silver),
            "GOLD" => Some(Self::Gold),
            "PLATINUM" => Some(Self::Platinum),
            _ => None,
        }
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A drawable destiny card. The description is the effect text handed to
/// the content generator when the card is played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardData {
    pub id: CardId,
    pub name: String,
    pub description: String,
    pub rarity: Rarity,
    pub phase: Phase,
    #[serde(default)]
    pub icon: Option<String>,
    /// `None` means the card can be drawn in every world.
    #[serde(default)]
    pub world_id: Option<WorldId>,
    #[serde(default)]
    pub unlocks_hero_id: Option<HeroId>,
}

impl CardData {
    /// Returns true if playing this card unlocks a hero.
    pub fn is_hero_unlock(&self) -> bool {
        self.unlocks_hero_id.is_some()
    }

    /// Returns true if the card may be drawn in the given world.
    pub fn available_in(&self, world: &WorldId) -> bool {
        self.world_id.as_ref().map_or(true, |w| w == world)
    }
}
