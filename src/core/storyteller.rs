//! Async driver tying the session to the content gateway, the ledger and
//! the saved-story library.
//!
//! Built via `StorytellerBuilder`. Gateway failures are replaced with
//! fallback content and store failures are logged, so once a story has
//! started nothing short of a misuse error stops it.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::book::BookDocument;
use crate::core::catalog::{Catalog, CatalogError};
use crate::core::config::{ConfigError, StoryConfig};
use crate::core::draw::DrawOffer;
use crate::core::gateway::{ContentGateway, PageDraft, FALLBACK_ILLUSTRATION};
use crate::core::ledger::{Ledger, LedgerError};
use crate::core::onboarding::{CustomHeroBuilder, OnboardingError};
use crate::core::session::{Advance, PageContent, PageTicket, Session, SessionError, Stage};
use crate::core::snapshot::{Library, SavedStory};
use crate::core::store::{self, KeyValueStore, HAS_PLAYED_KEY, STORIES_KEY};
use crate::schema::card::CardId;
use crate::schema::hero::{Hero, HeroId, HeroKind};
use crate::schema::page::StoryPage;
use crate::schema::world::WorldId;

#[derive(Debug, Error)]
pub enum StorytellerError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("wallet error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("onboarding error: {0}")]
    Onboarding(#[from] OnboardingError),
    #[error("saved story not found: {0}")]
    StoryNotFound(String),
}

/// What a call to [`Storyteller::advance_page`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Turned { index: usize },
    Stayed,
    DrawOpened(DrawOffer),
    PageWritten(StoryPage),
    /// The story ended; carries the id of the saved snapshot, if one was
    /// written.
    Ended { snapshot_id: Option<String> },
}

pub struct Storyteller<G, S> {
    gateway: G,
    store: S,
    session: Session,
    ledger: Ledger,
    library: Library,
    has_played: bool,
}

/// Builder for constructing a `Storyteller`.
pub struct StorytellerBuilder {
    catalog: Option<Arc<Catalog>>,
    catalog_packs: Vec<PathBuf>,
    config: Option<StoryConfig>,
    config_path: Option<PathBuf>,
    seed: u64,
}

impl Default for StorytellerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StorytellerBuilder {
    pub fn new() -> Self {
        Self {
            catalog: None,
            catalog_packs: Vec::new(),
            config: None,
            config_path: None,
            seed: 0,
        }
    }

    /// Use this catalog instead of the built-in Sky Island one.
    pub fn catalog(mut self, catalog: Arc<Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Merge a card pack RON file over the base catalog.
    pub fn catalog_pack(mut self, path: &Path) -> Self {
        self.catalog_packs.push(path.to_path_buf());
        self
    }

    pub fn config(mut self, config: StoryConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load the story config from a RON file. Takes precedence over
    /// [`StorytellerBuilder::config`].
    pub fn config_path(mut self, path: &Path) -> Self {
        self.config_path = Some(path.to_path_buf());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Assemble the storyteller, loading wallet, unlocks and library from
    /// the store.
    pub fn build<G, S>(self, gateway: G, store: S) -> Result<Storyteller<G, S>, StorytellerError>
    where
        G: ContentGateway,
        S: KeyValueStore,
    {
        let config = match &self.config_path {
            Some(path) => StoryConfig::load_from_ron(path)?,
            None => {
                let config = self.config.unwrap_or_default();
                config.validate()?;
                config
            }
        };

        let catalog = match (self.catalog, self.catalog_packs.is_empty()) {
            (Some(catalog), true) => catalog,
            (base, _) => {
                let mut catalog = match base {
                    Some(base) => (*base).clone(),
                    None => Catalog::sky_island()?,
                };
                for path in &self.catalog_packs {
                    catalog.merge(Catalog::load_from_ron(path)?);
                }
                catalog.validate()?;
                Arc::new(catalog)
            }
        };

        let ledger = Ledger::load(&store, config.starting_coins);
        let library = Library::load(&store, config.library_capacity);
        let has_played = store::load_json::<bool, _>(&store, HAS_PLAYED_KEY).unwrap_or(false);
        info!(
            coins = ledger.coins(),
            stories = library.len(),
            "storyteller ready"
        );

        Ok(Storyteller {
            gateway,
            store,
            session: Session::new(catalog, config, self.seed),
            ledger,
            library,
            has_played,
        })
    }
}

impl<G, S> Storyteller<G, S>
where
    G: ContentGateway,
    S: KeyValueStore,
{
    /// Start a story with a catalog hero.
    pub async fn start_session(
        &mut self,
        hero_id: &HeroId,
        world_id: &WorldId,
        author: Option<&str>,
    ) -> Result<StoryPage, StorytellerError> {
        let hero = self
            .session
            .catalog()
            .hero(hero_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownHero(hero_id.clone()))?;
        self.start_session_with(hero, world_id, author).await
    }

    /// Start a story with any hero, e.g. one built during onboarding.
    ///
    /// Costs one coin. With an empty wallet nothing changes and
    /// `InsufficientFunds` is returned.
    pub async fn start_session_with(
        &mut self,
        hero: Hero,
        world_id: &WorldId,
        author: Option<&str>,
    ) -> Result<StoryPage, StorytellerError> {
        if !self.ledger.is_available(&hero) {
            return Err(SessionError::HeroLocked(hero.id.clone()).into());
        }
        self.ledger.ensure_can_afford()?;

        // A custom hero's creator signs the book unless someone else does.
        let creator = (hero.kind == HeroKind::Custom).then(|| hero.name.clone());
        let author = author
            .filter(|a| !a.trim().is_empty())
            .or(creator.as_deref());
        let ticket = self.session.begin(hero, world_id, author)?;
        self.ledger.spend_coin()?;
        self.ledger.persist(&mut self.store);

        self.fulfil(ticket).await
    }

    /// Turn the page. May open a draw, write a new page, or end the story
    /// (saving it as finished).
    pub async fn advance_page(&mut self) -> Result<Progress, StorytellerError> {
        match self.session.advance()? {
            Advance::Turned { index } => Ok(Progress::Turned { index }),
            Advance::Stayed => Ok(Progress::Stayed),
            Advance::DrawOpened(offer) => Ok(Progress::DrawOpened(offer)),
            Advance::Generate(ticket) => Ok(Progress::PageWritten(self.fulfil(ticket).await?)),
            Advance::Ended => {
                let snapshot_id = self.end_story()?;
                Ok(Progress::Ended { snapshot_id })
            }
        }
    }

    /// Play a card from the open draw and write the page it leads to.
    pub async fn select_card(&mut self, card_id: &CardId) -> Result<StoryPage, StorytellerError> {
        let selection = self.session.select_card(card_id)?;
        if let Some(hero_id) = &selection.unlocked_hero {
            if self.ledger.unlock_hero(hero_id) {
                self.ledger.persist(&mut self.store);
            }
        }
        self.fulfil(selection.ticket).await
    }

    /// Run a custom hero's photo through analysis and avatar generation.
    /// The result is kept on the builder (`builder.avatar()`).
    pub async fn analyze_photo(
        &self,
        builder: &mut CustomHeroBuilder,
        image: &[u8],
    ) -> Result<(), StorytellerError> {
        builder.analyze_photo(&self.gateway, image).await?;
        Ok(())
    }

    /// Open a saved story. Resuming an unfinished story needs at least one
    /// coin in the wallet but does not spend it; reading a finished one is
    /// free.
    pub fn load_session(&mut self, story_id: &str) -> Result<Stage, StorytellerError> {
        let story = self
            .library
            .get(story_id)
            .cloned()
            .ok_or_else(|| StorytellerError::StoryNotFound(story_id.to_string()))?;
        if story.is_resumable() {
            self.ledger.ensure_can_afford()?;
        }
        self.session.load(&story)?;
        Ok(self.session.stage())
    }

    /// Save the story as unfinished (if it has pages) and return to
    /// onboarding. Returns the snapshot id.
    pub fn save_and_exit(&mut self) -> Option<String> {
        let origin = self.session.resumed_from().map(str::to_string);
        let snapshot = self.session.exit(Utc::now())?;
        Some(self.store_snapshot(snapshot, origin))
    }

    /// Save the story as finished. Returns `None` if it was already saved.
    pub fn end_story(&mut self) -> Result<Option<String>, StorytellerError> {
        let origin = self.session.resumed_from().map(str::to_string);
        Ok(self
            .session
            .finish(Utc::now())?
            .map(|snapshot| self.store_snapshot(snapshot, origin)))
    }

    pub fn collect_star(&mut self) -> u32 {
        self.session.collect_star()
    }

    pub fn go_back(&mut self) -> Result<Option<usize>, StorytellerError> {
        Ok(self.session.go_back()?)
    }

    /// Add coins to the wallet. Returns the new balance.
    pub fn top_up(&mut self, amount: u32) -> u32 {
        let balance = self.ledger.top_up(amount);
        self.ledger.persist(&mut self.store);
        balance
    }

    /// Forget unlocks and restore the starting balance.
    pub fn reset_progress(&mut self) {
        self.ledger.reset_progress();
        self.ledger.persist(&mut self.store);
    }

    pub fn clear_library(&mut self) {
        self.library.clear();
        store::remove_key(&mut self.store, STORIES_KEY);
    }

    /// Book layout of the story on screen, finished or not.
    pub fn export_book(&self) -> Option<BookDocument> {
        self.session
            .snapshot(true, Utc::now())
            .map(|story| BookDocument::from_snapshot(&story))
    }

    /// Heroes the reader may start a story with.
    pub fn available_heroes(&self) -> Vec<&Hero> {
        self.session
            .catalog()
            .heroes()
            .iter()
            .filter(|h| self.ledger.is_available(h))
            .collect()
    }

    /// True until the first story has been finished.
    pub fn is_first_time(&self) -> bool {
        !self.has_played
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn catalog(&self) -> &Catalog {
        self.session.catalog()
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Generate text and illustration for a ticket and apply them.
    async fn fulfil(&mut self, ticket: PageTicket) -> Result<StoryPage, StorytellerError> {
        let draft = match self.gateway.generate_page(&ticket.request).await {
            Ok(draft) => draft,
            Err(e) => {
                warn!(page = ticket.page_number(), error = %e, "page generation failed; using fallback page");
                PageDraft::fallback()
            }
        };

        let image = match self
            .gateway
            .generate_illustration(
                &draft.image_prompt,
                Some(&ticket.main_reference),
                ticket.secondary_reference.as_deref(),
            )
            .await
        {
            Ok(image) => image,
            Err(e) => {
                warn!(page = ticket.page_number(), error = %e, "illustration failed; using placeholder");
                FALLBACK_ILLUSTRATION.to_string()
            }
        };

        let content = PageContent {
            text: draft.text,
            image,
            companion_status: draft.companion_status,
        };
        let page = self.session.complete(&ticket, content)?.clone();
        debug!(page = page.page_number, "page written");
        Ok(page)
    }

    fn store_snapshot(&mut self, snapshot: SavedStory, origin: Option<String>) -> String {
        // A resumed story replaces the snapshot it was resumed from.
        if let Some(origin) = origin {
            self.library.remove(&origin);
        }
        let id = snapshot.id.clone();
        let finished = snapshot.is_finished;
        for evicted in self.library.insert(snapshot) {
            debug!(story = %evicted.id, "evicted from library");
        }
        self.library.persist(&mut self.store);

        if finished && !self.has_played {
            self.has_played = true;
            store::save_json(&mut self.store, HAS_PLAYED_KEY, &true);
        }
        info!(story = %id, finished, "story saved");
        id
    }
}
