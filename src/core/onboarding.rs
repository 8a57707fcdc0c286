//! Custom hero creation from an uploaded photo.

use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::gateway::{ContentGateway, ImageAnalysis, FALLBACK_AVATAR};
use crate::schema::hero::{Hero, HeroId, HeroKind};

/// Powers handed out at random to custom heroes.
pub const SUPERPOWERS: [&str; 16] = [
    "Invisibility",
    "Flying",
    "Telepathy",
    "Super Strength",
    "Time Travel",
    "Talking to Animals",
    "Weather Control",
    "Teleportation",
    "Force Fields",
    "Laser Eyes",
    "Water Breathing",
    "Computer Brain",
    "Shape Shifting",
    "Plant Whispering",
    "Magic Glow",
    "Super Speed",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OnboardingError {
    #[error("your hero needs a name")]
    MissingName,
    #[error("hmm, try a clearer photo!")]
    UnclearPhoto,
    #[error("no photo has been analyzed yet")]
    PhotoMissing,
}

impl OnboardingError {
    /// Whether the reader can fix this by trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UnclearPhoto | Self::PhotoMissing)
    }
}

/// Collects a name and a photo-derived look, then mints a `Custom` hero.
#[derive(Debug, Clone, Default)]
pub struct CustomHeroBuilder {
    name: String,
    description: Option<String>,
    avatar: Option<String>,
}

impl CustomHeroBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appearance text from the last accepted photo.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    /// Analyze a photo and generate an avatar for it.
    ///
    /// Rejected or failed analysis clears any earlier result and returns
    /// the retryable `UnclearPhoto`. A failed avatar render falls back to a
    /// placeholder avatar.
    pub async fn analyze_photo<G>(&mut self, gateway: &G, image: &[u8]) -> Result<&str, OnboardingError>
    where
        G: ContentGateway + ?Sized,
    {
        self.description = None;
        self.avatar = None;

        let description = match gateway.analyze_image(image).await {
            Ok(ImageAnalysis {
                is_valid: true,
                description: Some(description),
            }) if !description.trim().is_empty() => description,
            Ok(_) => {
                info!("photo rejected by analysis");
                return Err(OnboardingError::UnclearPhoto);
            }
            Err(e) => {
                warn!(error = %e, "photo analysis failed");
                return Err(OnboardingError::UnclearPhoto);
            }
        };

        let avatar = match gateway.generate_avatar(&description).await {
            Ok(avatar) => avatar,
            Err(e) => {
                warn!(error = %e, "avatar generation failed; using placeholder");
                FALLBACK_AVATAR.to_string()
            }
        };

        self.description = Some(description);
        Ok(self.avatar.insert(avatar).as_str())
    }

    /// Build the hero. Needs a non-blank name and an analyzed photo.
    pub fn finish<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Hero, OnboardingError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(OnboardingError::MissingName);
        }
        let (description, avatar) = match (&self.description, &self.avatar) {
            (Some(d), Some(a)) => (d.clone(), a.clone()),
            _ => return Err(OnboardingError::PhotoMissing),
        };

        let power = SUPERPOWERS[rng.gen_range(0..SUPERPOWERS.len())];
        let hero = Hero {
            id: HeroId(format!("custom-{}", Uuid::new_v4().simple())),
            name: name.to_string(),
            power: power.to_string(),
            ai_instruction: format!("Protagonist trait: The creator. Power: {}.", power),
            portrait: avatar,
            emoji: "✨".to_string(),
            appearance: Some(description),
            kind: HeroKind::Custom,
        };
        info!(hero = %hero.id, power, "custom hero created");
        Ok(hero)
    }
}
