//! WASM bindings for storybook-engine: drives the picture-book web front-end.
//!
//! The browser owns the network, so content generation happens on the JS
//! side. Each step that needs a new page hands back a page request; the
//! front-end answers it with `complete_page` (or `complete_with_fallback`
//! when its model call failed).

use std::collections::BTreeMap;
use std::sync::Arc;
use wasm_bindgen::prelude::*;

use chrono::Utc;
use storybook_engine::core::book::BookDocument;
use storybook_engine::core::catalog::Catalog;
use storybook_engine::core::config::StoryConfig;
use storybook_engine::core::draw::DrawOffer;
use storybook_engine::core::gateway::{PageDraft, FALLBACK_ILLUSTRATION};
use storybook_engine::core::ledger::Ledger;
use storybook_engine::core::session::{
    Advance, PageContent, PageTicket, Session, SessionError, Stage,
};
use storybook_engine::core::snapshot::{Library, SavedStory};
use storybook_engine::core::store::{
    self, KeyValueStore, MemoryStore, HAS_PLAYED_KEY, HERO_UNLOCKS_KEY, STORIES_KEY, WALLET_KEY,
};
use storybook_engine::schema::card::CardId;
use storybook_engine::schema::hero::{Hero, HeroId, HeroKind};
use storybook_engine::schema::world::WorldId;

const PROGRESS_KEYS: [&str; 4] = [STORIES_KEY, HERO_UNLOCKS_KEY, WALLET_KEY, HAS_PLAYED_KEY];

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct HeroInfo<'a> {
    #[serde(flatten)]
    hero: &'a Hero,
    available: bool,
}

#[derive(serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StepOutput {
    Turned { index: usize },
    Stayed,
    Draw { offer: DrawOffer },
    Generate { ticket: PageTicket },
    Ended { snapshot_id: Option<String> },
}

fn js_err(context: &str, e: impl std::fmt::Display) -> JsError {
    JsError::new(&format!("{context}: {e}"))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| js_err("Serialization error", e))
}

// ---------------------------------------------------------------------------
// StoryBook: the main exported struct
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct StoryBook {
    session: Session,
    ledger: Ledger,
    library: Library,
    store: MemoryStore,
    starting_coins: u32,
    library_capacity: usize,
    pending: Option<PageTicket>,
}

#[wasm_bindgen]
impl StoryBook {
    /// Create a book with the built-in Sky Island catalog.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> Result<StoryBook, JsError> {
        let catalog = Catalog::sky_island().map_err(|e| js_err("Catalog error", e))?;
        let config = StoryConfig::default();
        let store = MemoryStore::new();
        Ok(StoryBook {
            ledger: Ledger::load(&store, config.starting_coins),
            library: Library::load(&store, config.library_capacity),
            starting_coins: config.starting_coins,
            library_capacity: config.library_capacity,
            session: Session::new(Arc::new(catalog), config, seed),
            store,
            pending: None,
        })
    }

    /// JSON array of heroes, each with an `available` flag.
    pub fn heroes(&self) -> Result<String, JsError> {
        let heroes: Vec<HeroInfo> = self
            .session
            .catalog()
            .heroes()
            .iter()
            .map(|hero| HeroInfo {
                hero,
                available: self.ledger.is_available(hero),
            })
            .collect();
        to_json(&heroes)
    }

    pub fn worlds(&self) -> Result<String, JsError> {
        to_json(self.session.catalog().worlds())
    }

    pub fn coins(&self) -> u32 {
        self.ledger.coins()
    }

    pub fn top_up(&mut self, amount: u32) -> u32 {
        let balance = self.ledger.top_up(amount);
        self.ledger.persist(&mut self.store);
        balance
    }

    /// Start a story with a catalog hero (or a custom hero given as JSON).
    /// Spends a coin and returns the ticket for page 1.
    pub fn start(
        &mut self,
        hero: &str,
        world_id: &str,
        author: Option<String>,
    ) -> Result<String, JsError> {
        let hero: Hero = match self.session.catalog().hero(&HeroId::from(hero)) {
            Some(h) => h.clone(),
            None => serde_json::from_str(hero).map_err(|e| js_err("Unknown hero", e))?,
        };
        if !self.ledger.is_available(&hero) {
            return Err(js_err("Cannot start", SessionError::HeroLocked(hero.id)));
        }
        self.ledger
            .ensure_can_afford()
            .map_err(|e| js_err("Cannot start", e))?;

        let creator = (hero.kind == HeroKind::Custom).then(|| hero.name.clone());
        let author = author.filter(|a| !a.trim().is_empty()).or(creator);
        let ticket = self
            .session
            .begin(hero, &WorldId::from(world_id), author.as_deref())
            .map_err(|e| js_err("Cannot start", e))?;
        self.ledger
            .spend_coin()
            .map_err(|e| js_err("Cannot start", e))?;
        self.ledger.persist(&mut self.store);
        self.hold(ticket)
    }

    /// Turn the page. Returns a JSON step: `turned`, `stayed`, `draw`,
    /// `generate` (with a ticket to fulfil) or `ended`.
    pub fn advance(&mut self) -> Result<String, JsError> {
        let step = match self.session.advance().map_err(|e| js_err("Cannot advance", e))? {
            Advance::Turned { index } => StepOutput::Turned { index },
            Advance::Stayed => StepOutput::Stayed,
            Advance::DrawOpened(offer) => StepOutput::Draw { offer },
            Advance::Generate(ticket) => {
                self.pending = Some(ticket.clone());
                StepOutput::Generate { ticket }
            }
            Advance::Ended => StepOutput::Ended {
                snapshot_id: self.end_story()?,
            },
        };
        to_json(&step)
    }

    /// Play a card from the open draw. Returns the ticket for the page it
    /// leads to.
    pub fn select_card(&mut self, card_id: &str) -> Result<String, JsError> {
        let selection = self
            .session
            .select_card(&CardId::from(card_id))
            .map_err(|e| js_err("Cannot select card", e))?;
        if let Some(hero_id) = &selection.unlocked_hero {
            if self.ledger.unlock_hero(hero_id) {
                self.ledger.persist(&mut self.store);
            }
        }
        self.hold(selection.ticket)
    }

    /// The ticket awaiting content, if any.
    pub fn pending_request(&self) -> Result<Option<String>, JsError> {
        self.pending.as_ref().map(to_json).transpose()
    }

    /// Apply generated content (`{text, image, companion_status}`) to the
    /// ticket with the given id. Results for superseded tickets are rejected.
    pub fn complete_page(&mut self, ticket_id: u64, content_json: &str) -> Result<String, JsError> {
        let content: PageContent =
            serde_json::from_str(content_json).map_err(|e| js_err("Invalid page JSON", e))?;
        self.apply(ticket_id, content)
    }

    /// Fill the ticket with the built-in fallback page and illustration.
    pub fn complete_with_fallback(&mut self, ticket_id: u64) -> Result<String, JsError> {
        let draft = PageDraft::fallback();
        self.apply(
            ticket_id,
            PageContent {
                text: draft.text,
                image: FALLBACK_ILLUSTRATION.to_string(),
                companion_status: draft.companion_status,
            },
        )
    }

    pub fn go_back(&mut self) -> Result<Option<usize>, JsError> {
        self.session.go_back().map_err(|e| js_err("Cannot go back", e))
    }

    pub fn collect_star(&mut self) -> u32 {
        self.session.collect_star()
    }

    /// Save the current story as unfinished and return to onboarding.
    pub fn save_and_exit(&mut self) -> Option<String> {
        let origin = self.session.resumed_from().map(str::to_string);
        self.pending = None;
        let snapshot = self.session.exit(Utc::now())?;
        Some(self.store_snapshot(snapshot, origin, false))
    }

    /// JSON array of saved stories, most recent first.
    pub fn library(&self) -> Result<String, JsError> {
        to_json(self.library.list())
    }

    /// Open a saved story. Returns the session stage.
    pub fn load(&mut self, story_id: &str) -> Result<String, JsError> {
        let story = self
            .library
            .get(story_id)
            .cloned()
            .ok_or_else(|| JsError::new(&format!("No saved story {story_id}")))?;
        if story.is_resumable() {
            self.ledger
                .ensure_can_afford()
                .map_err(|e| js_err("Cannot resume", e))?;
        }
        self.session
            .load(&story)
            .map_err(|e| js_err("Cannot load", e))?;
        self.pending = None;
        to_json(&self.session.stage())
    }

    /// JSON state of the story on screen.
    pub fn story(&self) -> Result<String, JsError> {
        let finished = matches!(self.session.stage(), Stage::Reading | Stage::Ending);
        to_json(&self.session.snapshot(finished, Utc::now()))
    }

    /// Book layout of the current story, or `null` with no story open.
    pub fn export_book(&self) -> Result<String, JsError> {
        let book = self
            .session
            .snapshot(true, Utc::now())
            .map(|story| BookDocument::from_snapshot(&story));
        to_json(&book)
    }

    pub fn is_first_time(&self) -> bool {
        !store::load_json::<bool, _>(&self.store, HAS_PLAYED_KEY).unwrap_or(false)
    }

    /// Wallet, unlocks and library as a JSON object for localStorage.
    pub fn export_progress(&self) -> Result<String, JsError> {
        let mut entries = BTreeMap::new();
        for key in PROGRESS_KEYS {
            if let Ok(Some(value)) = self.store.get(key) {
                entries.insert(key, value);
            }
        }
        to_json(&entries)
    }

    /// Restore progress exported by `export_progress`.
    pub fn import_progress(&mut self, json: &str) -> Result<(), JsError> {
        let entries: BTreeMap<String, String> =
            serde_json::from_str(json).map_err(|e| js_err("Invalid progress JSON", e))?;
        for (key, value) in entries {
            if PROGRESS_KEYS.contains(&key.as_str()) {
                self.store
                    .set(&key, value)
                    .map_err(|e| js_err("Store error", e))?;
            }
        }
        self.ledger = Ledger::load(&self.store, self.starting_coins);
        self.library = Library::load(&self.store, self.library_capacity);
        Ok(())
    }
}

impl StoryBook {
    fn hold(&mut self, ticket: PageTicket) -> Result<String, JsError> {
        let json = to_json(&ticket)?;
        self.pending = Some(ticket);
        Ok(json)
    }

    fn apply(&mut self, ticket_id: u64, content: PageContent) -> Result<String, JsError> {
        let ticket = match &self.pending {
            Some(t) if t.id == ticket_id => t.clone(),
            _ => {
                return Err(js_err(
                    "Cannot complete page",
                    SessionError::StaleTicket { ticket: ticket_id },
                ))
            }
        };
        let page = self
            .session
            .complete(&ticket, content)
            .map_err(|e| js_err("Cannot complete page", e))?
            .clone();
        self.pending = None;
        to_json(&page)
    }

    fn end_story(&mut self) -> Result<Option<String>, JsError> {
        let origin = self.session.resumed_from().map(str::to_string);
        let snapshot = self
            .session
            .finish(Utc::now())
            .map_err(|e| js_err("Cannot finish", e))?;
        Ok(snapshot.map(|s| self.store_snapshot(s, origin, true)))
    }

    fn store_snapshot(&mut self, snapshot: SavedStory, origin: Option<String>, finished: bool) -> String {
        if let Some(origin) = origin {
            self.library.remove(&origin);
        }
        let id = snapshot.id.clone();
        self.library.insert(snapshot);
        self.library.persist(&mut self.store);
        if finished {
            store::save_json(&mut self.store, HAS_PLAYED_KEY, &true);
        }
        id
    }
}
