use serde::{Deserialize, Serialize};

use super::phase::Phase;

/// Whether the active companion keeps travelling with the hero after a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanionStatus {
    #[default]
    Stays,
    Leaves,
}

/// One generated page of a story. Pages are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryPage {
    /// 1-based position in the story.
    pub page_number: u32,
    pub text: String,
    /// Illustration handle (URL, data URI or placeholder).
    pub image: String,
    /// Name of the card whose choice produced this page.
    #[serde(default)]
    pub user_choice: Option<String>,
    pub phase: Phase,
}
