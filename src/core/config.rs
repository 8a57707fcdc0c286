//! Story configuration: page count, draw checkpoints, wallet defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::schema::phase::{Phase, PhaseBoundaries};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid story config: {0}")]
    Invalid(String),
}

/// Tunable constants of the story arc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "StoryConfig", default)]
pub struct StoryConfig {
    pub total_pages: u32,
    /// Pages at whose end a card draw is offered.
    pub draw_trigger_pages: Vec<u32>,
    pub phase_boundaries: PhaseBoundaries,
    /// Maximum number of cards in one offer.
    pub offer_size: usize,
    pub starting_coins: u32,
    /// Saved stories kept in the library.
    pub library_capacity: usize,
    pub default_author: String,
    /// How many previous pages are sent as context for the next page.
    pub context_window_pages: usize,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            total_pages: 10,
            draw_trigger_pages: vec![1, 3, 5, 7, 9],
            phase_boundaries: PhaseBoundaries::default(),
            offer_size: 3,
            starting_coins: 3,
            library_capacity: 5,
            default_author: "The Dreamer".to_string(),
            context_window_pages: 3,
        }
    }
}

impl StoryConfig {
    pub fn load_from_ron(path: &Path) -> Result<StoryConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse and validate a config. Omitted fields take their defaults.
    pub fn parse_ron(input: &str) -> Result<StoryConfig, ConfigError> {
        let config: StoryConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_pages < 1 {
            return Err(ConfigError::Invalid("total_pages must be at least 1".to_string()));
        }
        if let Some(page) = self
            .draw_trigger_pages
            .iter()
            .find(|p| **p < 1 || **p >= self.total_pages)
        {
            return Err(ConfigError::Invalid(format!(
                "draw trigger page {} is outside 1..{}",
                page, self.total_pages
            )));
        }
        if !self.phase_boundaries.is_valid_for(self.total_pages) {
            return Err(ConfigError::Invalid(format!(
                "phase boundaries {:?} do not fit a {}-page story",
                self.phase_boundaries, self.total_pages
            )));
        }
        if self.offer_size == 0 {
            return Err(ConfigError::Invalid("offer_size must be at least 1".to_string()));
        }
        if self.library_capacity == 0 {
            return Err(ConfigError::Invalid(
                "library_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_trigger_page(&self, page_number: u32) -> bool {
        self.draw_trigger_pages.contains(&page_number)
    }

    pub fn phase_for(&self, page_number: u32) -> Phase {
        self.phase_boundaries.phase_for(page_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = StoryConfig::default();
        config.validate().unwrap();
        assert!(config.is_trigger_page(1));
        assert!(config.is_trigger_page(9));
        assert!(!config.is_trigger_page(10));
        assert_eq!(config.phase_for(7), Phase::Climax);
    }

    #[test]
    fn partial_ron_fills_defaults() {
        let config = StoryConfig::parse_ron("StoryConfig(starting_coins: 5)").unwrap();
        assert_eq!(config.starting_coins, 5);
        assert_eq!(config.total_pages, 10);
        assert_eq!(config.default_author, "The Dreamer");
    }

    #[test]
    fn short_story_config() {
        let config = StoryConfig::parse_ron(
            r#"(
                total_pages: 6,
                draw_trigger_pages: [1, 3],
                phase_boundaries: (setup_last: 1, adventure_last: 3, climax_last: 4),
            )"#,
        )
        .unwrap();
        assert_eq!(config.phase_for(6), Phase::Resolution);
    }

    #[test]
    fn rejects_trigger_on_last_page() {
        let err = StoryConfig::parse_ron("(draw_trigger_pages: [1, 10])").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_boundaries_past_the_end() {
        let err = StoryConfig::parse_ron("(total_pages: 8)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_empty_offer() {
        let err = StoryConfig::parse_ron("(offer_size: 0)").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_ron() {
        let err = StoryConfig::parse_ron("(total_pages: \"ten\")").unwrap_err();
        assert!(matches!(err, ConfigError::Ron(_)));
    }
}
