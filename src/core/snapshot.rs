//! Saved stories and the bounded library that keeps them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::core::store::{self, KeyValueStore, STORIES_KEY};
use crate::schema::card::CardId;
use crate::schema::hero::{Hero, HeroId};
use crate::schema::page::StoryPage;
use crate::schema::phase::Phase;
use crate::schema::world::WorldId;

fn default_finished() -> bool {
    true
}

fn default_phase() -> Phase {
    Phase::Setup
}

fn default_world() -> WorldId {
    WorldId::from("sky-island")
}

/// Immutable record of a paused or finished story.
///
/// Optional fields default the way older saves expect: a snapshot without
/// `is_finished` is treated as finished and opens read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedStory {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub hero: Hero,
    #[serde(default = "default_world")]
    pub world_id: WorldId,
    pub pages: Vec<StoryPage>,
    pub author_name: String,
    #[serde(default)]
    pub stars_collected: u32,
    #[serde(default = "default_finished")]
    pub is_finished: bool,
    #[serde(default = "default_phase")]
    pub current_phase: Phase,
    #[serde(default)]
    pub used_card_ids: Vec<CardId>,
    #[serde(default)]
    pub hero_encountered: bool,
    #[serde(default)]
    pub active_companion_id: Option<HeroId>,
}

impl SavedStory {
    /// Can this snapshot be continued rather than only read?
    pub fn is_resumable(&self) -> bool {
        !self.is_finished
    }

    pub fn last_page_number(&self) -> u32 {
        self.pages.last().map_or(0, |p| p.page_number)
    }
}

/// Snapshot ids are the save time in milliseconds plus a random suffix,
/// so two saves in the same millisecond never collide.
pub fn new_snapshot_id(now: DateTime<Utc>) -> String {
    format!("{}-{}", now.timestamp_millis(), Uuid::new_v4().simple())
}

/// Saved stories, most recent first, never more than `capacity`.
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    stories: Vec<SavedStory>,
    capacity: usize,
}

impl Library {
    pub fn new(capacity: usize) -> Self {
        Self {
            stories: Vec::new(),
            capacity,
        }
    }

    /// Load the library from a store. Unreadable data yields an empty
    /// library; oversized lists are cut back to `capacity`.
    pub fn load<S: KeyValueStore + ?Sized>(store: &S, capacity: usize) -> Self {
        let mut library = Self::new(capacity);
        if let Some(stories) = store::load_json::<Vec<SavedStory>, _>(store, STORIES_KEY) {
            library.stories = stories;
            library.enforce_order_and_capacity();
        }
        debug!(stories = library.len(), "library loaded");
        library
    }

    pub fn persist<S: KeyValueStore + ?Sized>(&self, store: &mut S) {
        store::save_json(store, STORIES_KEY, &self.stories);
    }

    /// Add a snapshot, evicting the oldest entries past capacity.
    /// Returns the evicted snapshots.
    pub fn insert(&mut self, story: SavedStory) -> Vec<SavedStory> {
        self.stories.retain(|s| s.id != story.id);
        self.stories.insert(0, story);
        self.enforce_order_and_capacity()
    }

    pub fn list(&self) -> &[SavedStory] {
        &self.stories
    }

    pub fn get(&self, id: &str) -> Option<&SavedStory> {
        self.stories.iter().find(|s| s.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<SavedStory> {
        let index = self.stories.iter().position(|s| s.id == id)?;
        Some(self.stories.remove(index))
    }

    pub fn clear(&mut self) {
        self.stories.clear();
    }

    pub fn len(&self) -> usize {
        self.stories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stories.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn enforce_order_and_capacity(&mut self) -> Vec<SavedStory> {
        // Stable: among equal timestamps the earlier position wins.
        self.stories.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if self.stories.len() > self.capacity {
            let evicted = self.stories.split_off(self.capacity);
            debug!(evicted = evicted.len(), "library over capacity");
            evicted
        } else {
            Vec::new()
        }
    }
}
