//! Narrative phases and the page-number → phase mapping.

use serde::{Deserialize, Serialize};

/// One of the four stages of the story arc.
///
/// Ordering follows the arc: `Setup < Adventure < Climax < Resolution`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Setup,
    Adventure,
    Climax,
    Resolution,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Setup,
        Phase::Adventure,
        Phase::Climax,
        Phase::Resolution,
    ];

    /// Upper-case label, matching the serialized form.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Setup => "SETUP",
            Self::Adventure => "ADVENTURE",
            Self::Climax => "CLIMAX",
            Self::Resolution => "RESOLUTION",
        }
    }

    /// What the page should accomplish during this phase.
    pub fn goal(&self) -> &'static str {
        match self {
            Self::Setup => "Simply introduce the hero and the setting. Show, don't tell.",
            Self::Adventure => {
                "Exploration, meeting NPCs, facing minor obstacles. Rising action."
            }
            Self::Climax => "High stakes, big challenges, or the central mystery revealed.",
            Self::Resolution => {
                "Winding down. Reward received, lesson learned, journey concludes."
            }
        }
    }

    /// The emotional register of the phase.
    pub fn tone(&self) -> &'static str {
        match self {
            Self::Setup => "Welcoming, descriptive, peaceful.",
            Self::Adventure => "Exciting, curious, interactive.",
            Self::Climax => "Dramatic, intense, epic, fast-paced.",
            Self::Resolution => "Warm, reflective, satisfying.",
        }
    }

    pub fn parse(s: &str) -> Option<Phase> {
        match s.to_ascii_uppercase().as_str() {
            "SETUP" => Some(Self::Setup),
            "ADVENTURE" => Some(Self::Adventure),
            "CLIMAX" => Some(Self::Climax),
            "RESOLUTION" => Some(Self::Resolution),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Last page number of each of the first three phases. Every page after
/// `climax_last` belongs to `Resolution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseBoundaries {
    pub setup_last: u32,
    pub adventure_last: u32,
    pub climax_last: u32,
}

impl Default for PhaseBoundaries {
    fn default() -> Self {
        Self {
            setup_last: 2,
            adventure_last: 6,
            climax_last: 8,
        }
    }
}

impl PhaseBoundaries {
    /// Map a 1-based page number to its phase.
    ///
    /// Callers must only pass page numbers inside the story; page 0 maps to
    /// `Setup` and anything past the last page maps to `Resolution`.
    pub fn phase_for(&self, page_number: u32) -> Phase {
        if page_number <= self.setup_last {
            Phase::Setup
        } else if page_number <= self.adventure_last {
            Phase::Adventure
        } else if page_number <= self.climax_last {
            Phase::Climax
        } else {
            Phase::Resolution
        }
    }

    /// True if the boundaries are strictly increasing and all three
    /// phases fit before `total_pages`.
    pub fn is_valid_for(&self, total_pages: u32) -> bool {
        self.setup_last >= 1
            && self.setup_last < self.adventure_last
            && self.adventure_last < self.climax_last
            && self.climax_last < total_pages
    }
}

/// Phase for a page under the standard ten-page arc.
pub fn phase_for(page_number: u32) -> Phase {
    PhaseBoundaries::default().phase_for(page_number)
}
