//! Content generation boundary: page text, illustrations, photo analysis
//! and avatars all come from a [`ContentGateway`].
//!
//! Gateway calls may fail; the storyteller swaps in the fallbacks defined
//! here instead of surfacing the error to the reader.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::schema::card::CardData;
use crate::schema::hero::Hero;
use crate::schema::page::CompanionStatus;
use crate::schema::phase::Phase;

/// Text used when page generation fails.
pub const FALLBACK_PAGE_TEXT: &str =
    "The clouds swirled mysteriously, hiding the path ahead. (The scribe lost their pen!)";
/// Illustration prompt paired with [`FALLBACK_PAGE_TEXT`].
pub const FALLBACK_IMAGE_PROMPT: &str = "A mysterious cloud fog covering a floating island";
/// Placeholder illustration handle.
pub const FALLBACK_ILLUSTRATION: &str = "data:image/svg+xml;charset=UTF-8,%3Csvg%20xmlns%3D%22http%3A%2F%2Fwww.w3.org%2F2000%2Fsvg%22%20width%3D%22600%22%20height%3D%22800%22%3E%3Crect%20width%3D%22100%25%22%20height%3D%22100%25%22%20fill%3D%22%23e0f2fe%22%2F%3E%3Ctext%20x%3D%2250%25%22%20y%3D%2250%25%22%20dominant-baseline%3D%22middle%22%20text-anchor%3D%22middle%22%20font-family%3D%22sans-serif%22%20font-size%3D%2224%22%20fill%3D%22%23333%22%3EImage%20Generation%20Unavailable%3C%2Ftext%3E%3C%2Fsvg%3E";
/// Avatar handle used when avatar generation fails.
pub const FALLBACK_AVATAR: &str = "https://api.dicebear.com/7.x/fun-emoji/svg?seed=fallback";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("generation request failed: {0}")]
    Request(String),
    #[error("malformed generation response: {0}")]
    Malformed(String),
}

/// Everything the generator needs to write one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page_number: u32,
    pub hero: Hero,
    /// World description for the opening page, recent page text after that.
    pub previous_context: String,
    pub phase: Phase,
    pub phase_goal: String,
    pub phase_tone: String,
    pub companion: Option<Hero>,
    pub card: Option<CardData>,
    /// Set when this page is the last of the story.
    pub is_ending: bool,
}

/// Generated page text before illustration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDraft {
    #[serde(alias = "storyText")]
    pub text: String,
    #[serde(alias = "imagePrompt")]
    pub image_prompt: String,
    #[serde(default, alias = "companionStatus")]
    pub companion_status: CompanionStatus,
}

impl PageDraft {
    /// The page substituted when generation fails. The companion stays.
    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_PAGE_TEXT.to_string(),
            image_prompt: FALLBACK_IMAGE_PROMPT.to_string(),
            companion_status: CompanionStatus::Stays,
        }
    }

    /// Decode a generator's JSON reply. A missing companion status reads
    /// as `STAYS`.
    pub fn from_json(input: &str) -> Result<PageDraft, GatewayError> {
        serde_json::from_str(input).map_err(|e| GatewayError::Malformed(e.to_string()))
    }
}

/// Result of checking an uploaded photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    #[serde(alias = "isValid")]
    pub is_valid: bool,
    #[serde(default, alias = "fullDescription")]
    pub description: Option<String>,
}

#[async_trait]
pub trait ContentGateway: Send + Sync {
    async fn generate_page(&self, request: &PageRequest) -> Result<PageDraft, GatewayError>;

    /// Render an illustration, optionally anchored on reference images
    /// (the hero first, then a companion).
    async fn generate_illustration(
        &self,
        prompt: &str,
        main_reference: Option<&str>,
        secondary_reference: Option<&str>,
    ) -> Result<String, GatewayError>;

    async fn analyze_image(&self, image: &[u8]) -> Result<ImageAnalysis, GatewayError>;

    async fn generate_avatar(&self, description: &str) -> Result<String, GatewayError>;
}

/// One recorded `generate_illustration` call.
#[derive(Debug, Clone, PartialEq)]
pub struct IllustrationCall {
    pub prompt: String,
    pub main_reference: Option<String>,
    pub secondary_reference: Option<String>,
}

#[derive(Debug, Default)]
struct Script {
    fail_pages: bool,
    fail_illustrations: bool,
    unclear_photos: bool,
    fail_avatars: bool,
    companion_statuses: VecDeque<CompanionStatus>,
    page_requests: Vec<PageRequest>,
    illustration_calls: Vec<IllustrationCall>,
}

/// Offline gateway with deterministic output.
///
/// Records every request, can be told to fail, and replays a queue of
/// companion statuses (then `STAYS`). Used by the preview tool and tests.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_companion_statuses(self, statuses: Vec<CompanionStatus>) -> Self {
        self.lock().companion_statuses = statuses.into();
        self
    }

    pub fn set_fail_pages(&self, fail: bool) {
        self.lock().fail_pages = fail;
    }

    pub fn set_fail_illustrations(&self, fail: bool) {
        self.lock().fail_illustrations = fail;
    }

    /// Make `analyze_image` reject every photo.
    pub fn set_unclear_photos(&self, unclear: bool) {
        self.lock().unclear_photos = unclear;
    }

    pub fn set_fail_avatars(&self, fail: bool) {
        self.lock().fail_avatars = fail;
    }

    pub fn page_requests(&self) -> Vec<PageRequest> {
        self.lock().page_requests.clone()
    }

    pub fn illustration_calls(&self) -> Vec<IllustrationCall> {
        self.lock().illustration_calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ContentGateway for ScriptedGateway {
    async fn generate_page(&self, request: &PageRequest) -> Result<PageDraft, GatewayError> {
        let mut script = self.lock();
        script.page_requests.push(request.clone());
        if script.fail_pages {
            return Err(GatewayError::Request("scripted page failure".to_string()));
        }

        let mut text = format!("Page {}. {}", request.page_number, request.hero.name);
        match &request.card {
            Some(card) => text.push_str(&format!(" meets {}.", card.name)),
            None if request.is_ending => text.push_str(" heads home, happy and sleepy."),
            None => text.push_str(&format!(" explores ({}).", request.phase.name().to_lowercase())),
        }
        if let Some(companion) = &request.companion {
            text.push_str(&format!(" {} is there too.", companion.name));
        }

        let companion_status = script.companion_statuses.pop_front().unwrap_or_default();
        Ok(PageDraft {
            text,
            image_prompt: format!("{} on page {}", request.hero.name, request.page_number),
            companion_status,
        })
    }

    async fn generate_illustration(
        &self,
        prompt: &str,
        main_reference: Option<&str>,
        secondary_reference: Option<&str>,
    ) -> Result<String, GatewayError> {
        let mut script = self.lock();
        script.illustration_calls.push(IllustrationCall {
            prompt: prompt.to_string(),
            main_reference: main_reference.map(str::to_string),
            secondary_reference: secondary_reference.map(str::to_string),
        });
        if script.fail_illustrations {
            return Err(GatewayError::Request("scripted illustration failure".to_string()));
        }
        Ok(format!("scripted://illustration/{}", script.illustration_calls.len()))
    }

    async fn analyze_image(&self, image: &[u8]) -> Result<ImageAnalysis, GatewayError> {
        let script = self.lock();
        if script.unclear_photos || image.is_empty() {
            return Ok(ImageAnalysis {
                is_valid: false,
                description: None,
            });
        }
        Ok(ImageAnalysis {
            is_valid: true,
            description: Some(format!(
                "A smiling child (photo of {} bytes) with curly hair and a striped shirt.",
                image.len()
            )),
        })
    }

    async fn generate_avatar(&self, description: &str) -> Result<String, GatewayError> {
        if self.lock().fail_avatars {
            return Err(GatewayError::Request("scripted avatar failure".to_string()));
        }
        Ok(format!("scripted://avatar/{}", description.len()))
    }
}
