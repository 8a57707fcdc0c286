//! The story-progression state machine.
//!
//! `Session` is synchronous. Every step that needs generated content
//! returns a [`PageTicket`]; the caller obtains text and illustration for
//! it (see [`crate::core::storyteller`]) and hands the result back through
//! [`Session::complete`]. While a ticket is outstanding the session refuses
//! to advance or accept a card, and a ticket from before a restart is
//! rejected as stale, so a late result can never append a page twice or
//! land in the wrong story.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::catalog::Catalog;
use crate::core::config::StoryConfig;
use crate::core::draw::{self, DrawOffer, DrawRequest};
use crate::core::gateway::PageRequest;
use crate::core::snapshot::{self, SavedStory};
use crate::schema::card::{CardData, CardId};
use crate::schema::hero::{Hero, HeroId};
use crate::schema::page::{CompanionStatus, StoryPage};
use crate::schema::phase::Phase;
use crate::schema::world::WorldId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("no story is in progress")]
    NotStarted,
    #[error("a page is still being generated")]
    GenerationInFlight,
    #[error("a card draw is waiting for a choice")]
    DrawPending,
    #[error("no card draw is open")]
    NoDrawPending,
    #[error("card '{0}' is not in the current offer")]
    CardNotOffered(CardId),
    #[error("generation ticket {ticket} is stale")]
    StaleTicket { ticket: u64 },
    #[error("unknown world: {0}")]
    UnknownWorld(WorldId),
    #[error("world '{0}' is locked")]
    WorldLocked(WorldId),
    #[error("unknown hero: {0}")]
    UnknownHero(HeroId),
    #[error("hero '{0}' has not been unlocked")]
    HeroLocked(HeroId),
    #[error("saved story has no pages")]
    EmptySnapshot,
    #[error("saved story is malformed: {0}")]
    MalformedSnapshot(String),
}

/// Where the session is in the story lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// No story yet: picking hero and world.
    Onboarding,
    /// Writing or browsing an active story.
    Playing,
    /// A card offer is open and must be resolved with `select_card`.
    DrawPending,
    /// The last page has been reached.
    Ending,
    /// Browsing a finished saved story. No generation.
    Reading,
}

/// A claim on the next page. Only the most recently issued ticket can be
/// completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTicket {
    pub id: u64,
    pub request: PageRequest,
    /// Hero portrait, the primary illustration reference.
    pub main_reference: String,
    /// Companion portrait as of ticket issue.
    pub secondary_reference: Option<String>,
}

impl PageTicket {
    pub fn page_number(&self) -> u32 {
        self.request.page_number
    }

    pub fn phase(&self) -> Phase {
        self.request.phase
    }
}

/// Generated content for a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub text: String,
    pub image: String,
    #[serde(default)]
    pub companion_status: CompanionStatus,
}

/// Outcome of [`Session::advance`].
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Moved to an already generated page.
    Turned { index: usize },
    /// Already on the last page of a read-only story.
    Stayed,
    /// The story is complete; the caller should save it.
    Ended,
    /// A card offer is open.
    DrawOpened(DrawOffer),
    /// A new page must be generated for this ticket.
    Generate(PageTicket),
}

/// Outcome of [`Session::select_card`].
#[derive(Debug, Clone, PartialEq)]
pub struct CardSelection {
    pub card: CardData,
    /// Hero the card unlocks, to be recorded in the ledger.
    pub unlocked_hero: Option<HeroId>,
    pub ticket: PageTicket,
}

/// One reader's story: pages, draws, companion and progress flags.
pub struct Session {
    config: StoryConfig,
    catalog: Arc<Catalog>,
    rng: StdRng,
    stage: Stage,
    hero: Option<Hero>,
    world_id: Option<WorldId>,
    world_context: String,
    author: String,
    pages: Vec<StoryPage>,
    current_index: usize,
    phase: Phase,
    used_cards: Vec<CardId>,
    used_set: FxHashSet<CardId>,
    companion: Option<HeroId>,
    hero_encountered: bool,
    stars: u32,
    pending_draw: Option<DrawOffer>,
    in_flight: Option<u64>,
    next_ticket: u64,
    finished_saved: bool,
    resumed_from: Option<String>,
}

impl Session {
    pub fn new(catalog: Arc<Catalog>, config: StoryConfig, seed: u64) -> Self {
        let author = config.default_author.clone();
        Self {
            config,
            catalog,
            rng: StdRng::seed_from_u64(seed),
            stage: Stage::Onboarding,
            hero: None,
            world_id: None,
            world_context: String::new(),
            author,
            pages: Vec::new(),
            current_index: 0,
            phase: Phase::Setup,
            used_cards: Vec::new(),
            used_set: FxHashSet::default(),
            companion: None,
            hero_encountered: false,
            stars: 0,
            pending_draw: None,
            in_flight: None,
            next_ticket: 1,
            finished_saved: false,
            resumed_from: None,
        }
    }

    /// Start a new story and request its first page.
    ///
    /// Hero availability and the coin check belong to the caller; this
    /// only validates the world. Any outstanding ticket becomes stale.
    pub fn begin(
        &mut self,
        hero: Hero,
        world_id: &WorldId,
        author: Option<&str>,
    ) -> Result<PageTicket, SessionError> {
        let world = self
            .catalog
            .world(world_id)
            .ok_or_else(|| SessionError::UnknownWorld(world_id.clone()))?;
        if world.locked {
            return Err(SessionError::WorldLocked(world_id.clone()));
        }
        let world_context = world.description.clone();

        self.reset();
        info!(hero = %hero.id, world = %world_id, "story started");
        self.hero = Some(hero);
        self.world_id = Some(world_id.clone());
        self.world_context = world_context;
        if let Some(name) = author.map(str::trim).filter(|a| !a.is_empty()) {
            self.author = name.to_string();
        }
        self.stage = Stage::Playing;

        let phase = self.config.phase_for(1);
        self.issue_ticket(phase, None)
    }

    /// Turn the page, open a draw, request a new page, or end the story.
    pub fn advance(&mut self) -> Result<Advance, SessionError> {
        if self.in_flight.is_some() {
            return Err(SessionError::GenerationInFlight);
        }
        match self.stage {
            Stage::Onboarding => Err(SessionError::NotStarted),
            Stage::DrawPending => Err(SessionError::DrawPending),
            Stage::Reading | Stage::Ending => {
                if self.current_index + 1 < self.pages.len() {
                    self.current_index += 1;
                    Ok(Advance::Turned {
                        index: self.current_index,
                    })
                } else {
                    Ok(Advance::Stayed)
                }
            }
            Stage::Playing => self.advance_playing(),
        }
    }

    fn advance_playing(&mut self) -> Result<Advance, SessionError> {
        if self.pages.is_empty() {
            return Err(SessionError::NotStarted);
        }
        if self.current_index + 1 < self.pages.len() {
            self.current_index += 1;
            return Ok(Advance::Turned {
                index: self.current_index,
            });
        }

        let last = self.pages.len() as u32;
        if last >= self.config.total_pages {
            self.stage = Stage::Ending;
            info!(pages = last, "story reached its last page");
            return Ok(Advance::Ended);
        }

        let next_phase = self.config.phase_for(last + 1);
        if self.config.is_trigger_page(last) {
            if let Some(offer) = self.open_draw(next_phase) {
                return Ok(Advance::DrawOpened(offer));
            }
            warn!(page = last, "no cards left to draw; continuing without a choice");
        }

        Ok(Advance::Generate(self.issue_ticket(next_phase, None)?))
    }

    fn open_draw(&mut self, next_phase: Phase) -> Option<DrawOffer> {
        let world_id = self.world_id.clone()?;
        let target_rarity =
            draw::roll_target_rarity(next_phase, self.hero_encountered, &mut self.rng);
        let request = DrawRequest {
            phase: next_phase,
            target_rarity: Some(target_rarity),
            used: &self.used_set,
            guarantee_hero: next_phase == Phase::Adventure && !self.hero_encountered,
            ban_heroes: self.hero_encountered,
            world_id: &world_id,
            offer_size: self.config.offer_size,
        };
        let cards = draw::draw(&self.catalog, &request, &mut self.rng);
        if cards.is_empty() {
            return None;
        }

        let offer = DrawOffer {
            phase: next_phase,
            target_rarity,
            cards,
        };
        // A revealed hero card counts as the encounter, chosen or not.
        if offer.has_hero_card() {
            self.hero_encountered = true;
        }
        info!(
            phase = %next_phase,
            rarity = %target_rarity,
            cards = offer.cards.len(),
            "card draw opened"
        );
        self.phase = next_phase;
        self.stage = Stage::DrawPending;
        self.pending_draw = Some(offer.clone());
        Some(offer)
    }

    /// Resolve the open draw with one of the offered cards.
    pub fn select_card(&mut self, card_id: &CardId) -> Result<CardSelection, SessionError> {
        if self.in_flight.is_some() {
            return Err(SessionError::GenerationInFlight);
        }
        if self.stage != Stage::DrawPending {
            return Err(SessionError::NoDrawPending);
        }
        let offer = self.pending_draw.as_ref().ok_or(SessionError::NoDrawPending)?;
        let card = offer
            .card(card_id)
            .cloned()
            .ok_or_else(|| SessionError::CardNotOffered(card_id.clone()))?;
        let phase = offer.phase;

        let unlocked_hero = card.unlocks_hero_id.clone();
        if let Some(hero_id) = &unlocked_hero {
            if self.catalog.hero(hero_id).is_some() {
                self.companion = Some(hero_id.clone());
                self.hero_encountered = true;
            }
        }
        if self.used_set.insert(card.id.clone()) {
            self.used_cards.push(card.id.clone());
        }
        debug!(card = %card.id, companion = ?self.companion, "card selected");

        self.pending_draw = None;
        self.stage = Stage::Playing;
        let ticket = self.issue_ticket(phase, Some(card.clone()))?;
        Ok(CardSelection {
            card,
            unlocked_hero,
            ticket,
        })
    }

    /// Apply generated content for the outstanding ticket and move to the
    /// new page.
    pub fn complete(
        &mut self,
        ticket: &PageTicket,
        content: PageContent,
    ) -> Result<&StoryPage, SessionError> {
        if self.in_flight != Some(ticket.id) {
            debug!(ticket = ticket.id, "discarding stale generation result");
            return Err(SessionError::StaleTicket { ticket: ticket.id });
        }
        self.in_flight = None;

        // The companion that was asked for stays unless the page says
        // otherwise.
        let asked_for = ticket.request.companion.as_ref().map(|h| h.id.clone());
        self.companion = match content.companion_status {
            CompanionStatus::Leaves => {
                if let Some(id) = &asked_for {
                    info!(companion = %id, "companion left the story");
                }
                None
            }
            CompanionStatus::Stays => asked_for,
        };

        let page = StoryPage {
            page_number: self.pages.len() as u32 + 1,
            text: content.text,
            image: content.image,
            user_choice: ticket.request.card.as_ref().map(|c| c.name.clone()),
            phase: ticket.phase(),
        };
        debug!(page = page.page_number, phase = %page.phase, "page appended");
        self.phase = page.phase;
        self.pages.push(page);
        self.current_index = self.pages.len() - 1;
        self.stage = Stage::Playing;
        Ok(&self.pages[self.current_index])
    }

    /// Step back one page. Pure navigation.
    pub fn go_back(&mut self) -> Result<Option<usize>, SessionError> {
        if self.pages.is_empty() {
            return Err(SessionError::NotStarted);
        }
        if self.stage == Stage::DrawPending {
            return Err(SessionError::DrawPending);
        }
        if self.current_index == 0 {
            return Ok(None);
        }
        self.current_index -= 1;
        Ok(Some(self.current_index))
    }

    /// Add one collected star. Returns the new total.
    pub fn collect_star(&mut self) -> u32 {
        self.stars = self.stars.saturating_add(1);
        self.stars
    }

    /// Restore a saved story. Unfinished stories resume at their last
    /// page; finished ones open read-only at the first page.
    pub fn load(&mut self, story: &SavedStory) -> Result<(), SessionError> {
        if story.pages.is_empty() {
            return Err(SessionError::EmptySnapshot);
        }
        if story.pages.len() > self.config.total_pages as usize {
            return Err(SessionError::MalformedSnapshot(format!(
                "{} pages in a {}-page story",
                story.pages.len(),
                self.config.total_pages
            )));
        }
        if let Some((i, page)) = story
            .pages
            .iter()
            .enumerate()
            .find(|(i, p)| p.page_number != *i as u32 + 1)
        {
            return Err(SessionError::MalformedSnapshot(format!(
                "page {} is numbered {}",
                i + 1,
                page.page_number
            )));
        }
        self.reset();

        self.hero = Some(story.hero.clone());
        self.world_id = Some(story.world_id.clone());
        self.world_context = self
            .catalog
            .world(&story.world_id)
            .map(|w| w.description.clone())
            .unwrap_or_default();
        self.author = story.author_name.clone();
        self.pages = story.pages.clone();
        self.phase = story.current_phase;
        for id in &story.used_card_ids {
            if self.used_set.insert(id.clone()) {
                self.used_cards.push(id.clone());
            }
        }
        let companion = story
            .active_companion_id
            .clone()
            .filter(|id| self.catalog.hero(id).is_some());
        self.companion = companion;
        self.hero_encountered = story.hero_encountered;
        self.stars = story.stars_collected;

        if story.is_resumable() {
            self.stage = Stage::Playing;
            self.current_index = self.pages.len() - 1;
            self.resumed_from = Some(story.id.clone());
        } else {
            self.stage = Stage::Reading;
            self.current_index = 0;
            self.finished_saved = true;
        }
        info!(story = %story.id, stage = ?self.stage, "story loaded");
        Ok(())
    }

    /// Snapshot the current story, or `None` if nothing has been written.
    pub fn snapshot(&self, is_finished: bool, now: DateTime<Utc>) -> Option<SavedStory> {
        let hero = self.hero.clone()?;
        if self.pages.is_empty() {
            return None;
        }
        Some(SavedStory {
            id: snapshot::new_snapshot_id(now),
            timestamp: now,
            hero,
            world_id: self.world_id.clone()?,
            pages: self.pages.clone(),
            author_name: self.author.clone(),
            stars_collected: self.stars,
            is_finished,
            current_phase: self.phase,
            used_card_ids: self.used_cards.clone(),
            hero_encountered: self.hero_encountered,
            active_companion_id: self.companion.clone(),
        })
    }

    /// Close the story and produce its finished snapshot. Returns `None`
    /// if it was already saved as finished.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<Option<SavedStory>, SessionError> {
        if self.stage == Stage::Onboarding || self.pages.is_empty() {
            return Err(SessionError::NotStarted);
        }
        if self.in_flight.is_some() {
            return Err(SessionError::GenerationInFlight);
        }
        if self.finished_saved {
            return Ok(None);
        }
        self.finished_saved = true;
        self.pending_draw = None;
        self.stage = Stage::Ending;
        info!(pages = self.pages.len(), stars = self.stars, "story finished");
        Ok(self.snapshot(true, now))
    }

    /// Leave the story, returning an unfinished snapshot if there is
    /// anything worth keeping. Read-only and already finished stories
    /// produce nothing. Outstanding tickets become stale.
    pub fn exit(&mut self, now: DateTime<Utc>) -> Option<SavedStory> {
        let snapshot = if self.finished_saved {
            None
        } else {
            self.snapshot(false, now)
        };
        self.reset();
        snapshot
    }

    /// Back to onboarding with an empty story.
    pub fn reset(&mut self) {
        if let Some(ticket) = self.in_flight.take() {
            debug!(ticket, "abandoning outstanding generation");
        }
        self.stage = Stage::Onboarding;
        self.hero = None;
        self.world_id = None;
        self.world_context.clear();
        self.author = self.config.default_author.clone();
        self.pages.clear();
        self.current_index = 0;
        self.phase = Phase::Setup;
        self.used_cards.clear();
        self.used_set.clear();
        self.companion = None;
        self.hero_encountered = false;
        self.stars = 0;
        self.pending_draw = None;
        self.finished_saved = false;
        self.resumed_from = None;
    }

    fn issue_ticket(
        &mut self,
        phase: Phase,
        card: Option<CardData>,
    ) -> Result<PageTicket, SessionError> {
        let hero = self.hero.clone().ok_or(SessionError::NotStarted)?;
        let id = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight = Some(id);

        let page_number = self.pages.len() as u32 + 1;
        let previous_context = if self.pages.is_empty() {
            self.world_context.clone()
        } else {
            self.previous_context()
        };
        let companion = self.companion_hero().cloned();

        debug!(ticket = id, page = page_number, phase = %phase, "generation ticket issued");
        Ok(PageTicket {
            id,
            secondary_reference: companion.as_ref().map(|c| c.portrait.clone()),
            main_reference: hero.portrait.clone(),
            request: PageRequest {
                page_number,
                hero,
                previous_context,
                phase,
                phase_goal: phase.goal().to_string(),
                phase_tone: phase.tone().to_string(),
                companion,
                card,
                is_ending: page_number == self.config.total_pages,
            },
        })
    }

    /// Text of the last few pages, joined with spaces.
    pub fn previous_context(&self) -> String {
        let start = self
            .pages
            .len()
            .saturating_sub(self.config.context_window_pages);
        self.pages[start..]
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_read_only(&self) -> bool {
        self.stage == Stage::Reading
    }

    pub fn hero(&self) -> Option<&Hero> {
        self.hero.as_ref()
    }

    pub fn world_id(&self) -> Option<&WorldId> {
        self.world_id.as_ref()
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn pages(&self) -> &[StoryPage] {
        &self.pages
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_page(&self) -> Option<&StoryPage> {
        self.pages.get(self.current_index)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Used card ids in selection order.
    pub fn used_cards(&self) -> &[CardId] {
        &self.used_cards
    }

    pub fn collected_cards(&self) -> Vec<&CardData> {
        self.catalog.collected_cards(&self.used_cards)
    }

    pub fn companion_id(&self) -> Option<&HeroId> {
        self.companion.as_ref()
    }

    pub fn companion_hero(&self) -> Option<&Hero> {
        self.companion.as_ref().and_then(|id| self.catalog.hero(id))
    }

    pub fn hero_encountered(&self) -> bool {
        self.hero_encountered
    }

    pub fn stars(&self) -> u32 {
        self.stars
    }

    pub fn pending_draw(&self) -> Option<&DrawOffer> {
        self.pending_draw.as_ref()
    }

    /// Id of the unfinished snapshot this story was resumed from.
    pub fn resumed_from(&self) -> Option<&str> {
        self.resumed_from.as_deref()
    }

    pub fn config(&self) -> &StoryConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::card::Rarity;
    use crate::schema::hero::HeroKind;
    use chrono::TimeZone;

    fn catalog() -> Arc<Catalog> {
        Arc::new(Catalog::sky_island().unwrap())
    }

    fn session(seed: u64) -> Session {
        Session::new(catalog(), StoryConfig::default(), seed)
    }

    fn jules(session: &Session) -> Hero {
        session.catalog().hero(&HeroId::from("jules")).unwrap().clone()
    }

    fn sky() -> WorldId {
        WorldId::from("sky-island")
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 19, 30, 0).unwrap()
    }

    fn content(ticket: &PageTicket, status: CompanionStatus) -> PageContent {
        PageContent {
            text: format!("Text of page {}.", ticket.page_number()),
            image: format!("img-{}", ticket.page_number()),
            companion_status: status,
        }
    }

    fn started(seed: u64) -> Session {
        let mut session = session(seed);
        let hero = jules(&session);
        let ticket = session.begin(hero, &sky(), Some("Mia")).unwrap();
        session
            .complete(&ticket, content(&ticket, CompanionStatus::Stays))
            .unwrap();
        session
    }

    /// Advance once, picking the first offered card if a draw opens, and
    /// complete any resulting page.
    fn step(session: &mut Session) -> Advance {
        let outcome = session.advance().unwrap();
        match &outcome {
            Advance::DrawOpened(offer) => {
                let id = offer.cards[0].id.clone();
                let selection = session.select_card(&id).unwrap();
                let page = content(&selection.ticket, CompanionStatus::Stays);
                session.complete(&selection.ticket, page).unwrap();
            }
            Advance::Generate(ticket) => {
                let page = content(ticket, CompanionStatus::Stays);
                session.complete(ticket, page).unwrap();
            }
            _ => {}
        }
        outcome
    }

    #[test]
    fn begin_requests_opening_page() {
        let mut session = session(1);
        let hero = jules(&session);
        let ticket = session.begin(hero, &sky(), None).unwrap();

        assert_eq!(ticket.page_number(), 1);
        assert_eq!(ticket.phase(), Phase::Setup);
        assert!(ticket.request.previous_context.contains("floating islands"));
        assert!(ticket.request.card.is_none());
        assert!(ticket.request.companion.is_none());
        assert!(!ticket.request.is_ending);
        assert_eq!(ticket.main_reference, ticket.request.hero.portrait);
        assert_eq!(session.author(), "The Dreamer");
        assert!(session.is_generating());
    }

    #[test]
    fn locked_and_unknown_worlds_refused() {
        let mut session = session(1);
        let hero = jules(&session);
        assert_eq!(
            session.begin(hero.clone(), &WorldId::from("neon-city"), None),
            Err(SessionError::WorldLocked(WorldId::from("neon-city")))
        );
        assert_eq!(
            session.begin(hero, &WorldId::from("moon"), None),
            Err(SessionError::UnknownWorld(WorldId::from("moon")))
        );
        assert_eq!(session.stage(), Stage::Onboarding);
    }

    #[test]
    fn advance_refused_while_generating() {
        let mut session = session(1);
        let hero = jules(&session);
        session.begin(hero, &sky(), None).unwrap();
        assert_eq!(session.advance(), Err(SessionError::GenerationInFlight));
    }

    #[test]
    fn advance_before_start_is_refused() {
        let mut session = session(1);
        assert_eq!(session.advance(), Err(SessionError::NotStarted));
        assert_eq!(session.go_back(), Err(SessionError::NotStarted));
    }

    /// Advance until a draw opens, completing plain pages on the way.
    fn open_next_draw(session: &mut Session) -> DrawOffer {
        loop {
            match session.advance().unwrap() {
                Advance::DrawOpened(offer) => return offer,
                Advance::Generate(ticket) => {
                    let page = content(&ticket, CompanionStatus::Stays);
                    session.complete(&ticket, page).unwrap();
                }
                other => panic!("no draw before {:?}", other),
            }
        }
    }

    fn choose(session: &mut Session, card: &CardId) {
        let selection = session.select_card(card).unwrap();
        let page = content(&selection.ticket, CompanionStatus::Stays);
        session.complete(&selection.ticket, page).unwrap();
    }

    #[test]
    fn first_trigger_opens_draw_for_next_page() {
        let mut session = started(2);
        assert_eq!(session.pages().len(), 1);
        assert_eq!(session.author(), "Mia");

        let offer = match session.advance().unwrap() {
            Advance::DrawOpened(offer) => offer,
            other => panic!("expected a draw, got {:?}", other),
        };
        assert_eq!(session.stage(), Stage::DrawPending);
        // Page 2 is still part of the opening.
        assert_eq!(offer.phase, Phase::Setup);
        assert_eq!(session.phase(), Phase::Setup);
        assert!(!offer.cards.is_empty() && offer.cards.len() <= 3);
        assert!(!session.hero_encountered());

        assert_eq!(session.advance(), Err(SessionError::DrawPending));
        assert_eq!(session.go_back(), Err(SessionError::DrawPending));
    }

    #[test]
    fn first_adventure_draw_reveals_a_hero() {
        let mut session = started(3);
        let first = open_next_draw(&mut session);
        choose(&mut session, &first.cards[0].id);

        let offer = open_next_draw(&mut session);
        assert_eq!(session.pages().len(), 3);
        assert_eq!(offer.phase, Phase::Adventure);
        assert_ne!(offer.target_rarity, Rarity::Silver);
        assert!(offer.has_hero_card());
        // Revealing the hero card counts as the encounter.
        assert!(session.hero_encountered());
    }

    #[test]
    fn select_card_requests_page_with_card() {
        let mut session = started(3);
        let offer = open_next_draw(&mut session);
        let card = offer.cards[0].clone();

        assert_eq!(
            session.select_card(&CardId::from("si_r_p5")),
            Err(SessionError::CardNotOffered(CardId::from("si_r_p5")))
        );

        let selection = session.select_card(&card.id).unwrap();
        assert_eq!(selection.unlocked_hero, None);
        assert_eq!(selection.ticket.request.card.as_ref(), Some(&card));
        assert_eq!(selection.ticket.page_number(), 2);
        assert_eq!(session.used_cards(), &[card.id.clone()]);
        assert_eq!(session.select_card(&card.id), Err(SessionError::GenerationInFlight));

        let page = session
            .complete(&selection.ticket, content(&selection.ticket, CompanionStatus::Stays))
            .unwrap()
            .clone();
        assert_eq!(page.page_number, 2);
        assert_eq!(page.user_choice.as_deref(), Some(card.name.as_str()));
        assert_eq!(page.phase, Phase::Setup);
        assert_eq!(session.current_index(), 1);
        assert_eq!(session.stage(), Stage::Playing);
        assert_eq!(session.select_card(&card.id), Err(SessionError::NoDrawPending));
    }

    #[test]
    fn hero_card_sets_companion_until_it_leaves() {
        let mut session = started(4);
        let first = open_next_draw(&mut session);
        choose(&mut session, &first.cards[0].id);
        let offer = open_next_draw(&mut session);

        let hero_card = offer.cards.iter().find(|c| c.is_hero_unlock()).unwrap().clone();
        let selection = session.select_card(&hero_card.id).unwrap();
        let companion_id = hero_card.unlocks_hero_id.clone().unwrap();

        assert_eq!(selection.unlocked_hero.as_ref(), Some(&companion_id));
        assert_eq!(session.companion_id(), Some(&companion_id));
        let requested = selection.ticket.request.companion.as_ref().unwrap();
        assert_eq!(requested.id, companion_id);
        assert_eq!(requested.kind, HeroKind::Unlockable);
        assert_eq!(
            selection.ticket.secondary_reference.as_deref(),
            Some(requested.portrait.as_str())
        );

        session
            .complete(&selection.ticket, content(&selection.ticket, CompanionStatus::Stays))
            .unwrap();
        assert_eq!(session.companion_id(), Some(&companion_id));

        // Page 4 is not a trigger page: the companion is asked for again.
        let ticket = match session.advance().unwrap() {
            Advance::Generate(ticket) => ticket,
            other => panic!("expected generation, got {:?}", other),
        };
        assert_eq!(ticket.request.companion.as_ref().map(|h| &h.id), Some(&companion_id));
        session
            .complete(&ticket, content(&ticket, CompanionStatus::Leaves))
            .unwrap();
        assert_eq!(session.companion_id(), None);
        assert!(session.hero_encountered());
    }

    #[test]
    fn encountered_hero_bans_later_hero_cards() {
        let mut session = started(5);
        while session.pages().len() < 10 {
            let encountered_before = session.hero_encountered();
            if let Advance::DrawOpened(offer) = step(&mut session) {
                if encountered_before {
                    assert!(!offer.has_hero_card(), "hero card offered after encounter");
                }
            }
        }
        assert!(session.hero_encountered());
    }

    #[test]
    fn full_story_runs_to_ending() {
        let mut session = started(6);
        let mut draws = 0;
        loop {
            match step(&mut session) {
                Advance::DrawOpened(_) => draws += 1,
                Advance::Ended => break,
                Advance::Generate(_) => {}
                other => panic!("unexpected {:?}", other),
            }
        }

        assert_eq!(draws, 5);
        assert_eq!(session.stage(), Stage::Ending);
        assert_eq!(session.pages().len(), 10);
        for (i, page) in session.pages().iter().enumerate() {
            assert_eq!(page.page_number, i as u32 + 1);
            assert_eq!(page.phase, session.config().phase_for(page.page_number));
        }
        // Pages following a draw record the chosen card.
        for n in [2, 4, 6, 8, 10] {
            assert!(session.pages()[n - 1].user_choice.is_some(), "page {}", n);
        }
        for n in [1, 3, 5, 7, 9] {
            assert!(session.pages()[n - 1].user_choice.is_none(), "page {}", n);
        }

        let used: FxHashSet<&CardId> = session.used_cards().iter().collect();
        assert_eq!(used.len(), 5);
        assert_eq!(session.collected_cards().len(), 5);

        assert_eq!(session.advance(), Ok(Advance::Stayed));
        let saved = session.finish(now()).unwrap().unwrap();
        assert!(saved.is_finished);
        assert_eq!(saved.author_name, "Mia");
        assert_eq!(session.finish(now()), Ok(None));
        assert!(session.exit(now()).is_none());
    }

    #[test]
    fn last_page_request_is_marked_as_ending() {
        let mut session = started(7);
        loop {
            let outcome = session.advance().unwrap();
            let ticket = match outcome {
                Advance::DrawOpened(offer) => {
                    session.select_card(&offer.cards[0].id).unwrap().ticket
                }
                Advance::Generate(ticket) => ticket,
                _ => break,
            };
            assert_eq!(ticket.request.is_ending, ticket.page_number() == 10);
            session
                .complete(&ticket, content(&ticket, CompanionStatus::Stays))
                .unwrap();
        }
        assert_eq!(session.pages().len(), 10);
    }

    #[test]
    fn stale_ticket_is_discarded() {
        let mut session = session(8);
        let hero = jules(&session);
        let old = session.begin(hero.clone(), &sky(), None).unwrap();
        let fresh = session.begin(hero, &sky(), None).unwrap();

        assert_eq!(
            session.complete(&old, content(&old, CompanionStatus::Stays)),
            Err(SessionError::StaleTicket { ticket: old.id })
        );
        session
            .complete(&fresh, content(&fresh, CompanionStatus::Stays))
            .unwrap();
        assert_eq!(
            session.complete(&fresh, content(&fresh, CompanionStatus::Stays)),
            Err(SessionError::StaleTicket { ticket: fresh.id })
        );
        assert_eq!(session.pages().len(), 1);
    }

    #[test]
    fn exit_abandons_generation_and_snapshots() {
        let mut session = started(9);
        let ticket = match session.advance().unwrap() {
            Advance::DrawOpened(offer) => session.select_card(&offer.cards[0].id).unwrap().ticket,
            other => panic!("expected a draw, got {:?}", other),
        };
        let saved = session.exit(now()).unwrap();
        assert!(!saved.is_finished);
        assert_eq!(saved.pages.len(), 1);
        assert_eq!(saved.used_card_ids.len(), 1);
        assert_eq!(session.stage(), Stage::Onboarding);
        assert!(matches!(
            session.complete(&ticket, content(&ticket, CompanionStatus::Stays)),
            Err(SessionError::StaleTicket { .. })
        ));
        assert!(session.pages().is_empty());
    }

    #[test]
    fn load_unfinished_resumes_at_last_page() {
        let mut original = started(10);
        step(&mut original);
        step(&mut original);
        original.collect_star();
        let saved = original.exit(now()).unwrap();

        let mut session = session(11);
        session.load(&saved).unwrap();
        assert_eq!(session.stage(), Stage::Playing);
        assert_eq!(session.current_index(), 2);
        assert_eq!(session.stars(), 1);
        assert_eq!(session.used_cards(), saved.used_card_ids.as_slice());
        assert_eq!(session.resumed_from(), Some(saved.id.as_str()));

        // Page 3 is a trigger page, so the resumed story can draw again.
        match session.advance().unwrap() {
            Advance::DrawOpened(offer) => {
                assert!(offer.cards.iter().all(|c| !saved.used_card_ids.contains(&c.id)));
            }
            other => panic!("expected a draw, got {:?}", other),
        }
    }

    #[test]
    fn load_finished_is_read_only() {
        let mut original = started(12);
        while !matches!(step(&mut original), Advance::Ended) {}
        let saved = original.finish(now()).unwrap().unwrap();

        let mut session = session(13);
        session.load(&saved).unwrap();
        assert_eq!(session.stage(), Stage::Reading);
        assert!(session.is_read_only());
        assert_eq!(session.current_index(), 0);

        for i in 1..10 {
            assert_eq!(session.advance(), Ok(Advance::Turned { index: i }));
        }
        assert_eq!(session.advance(), Ok(Advance::Stayed));
        assert_eq!(session.go_back(), Ok(Some(8)));
        assert_eq!(session.finish(now()), Ok(None));
        assert!(session.exit(now()).is_none());
    }

    #[test]
    fn empty_snapshot_rejected() {
        let mut original = started(14);
        let mut saved = original.exit(now()).unwrap();
        saved.pages.clear();
        let mut session = session(15);
        assert_eq!(session.load(&saved), Err(SessionError::EmptySnapshot));
    }

    #[test]
    fn misnumbered_snapshot_rejected() {
        let mut original = started(14);
        step(&mut original);
        let mut saved = original.exit(now()).unwrap();
        saved.pages[1].page_number = 7;

        let mut session = session(15);
        assert!(matches!(
            session.load(&saved),
            Err(SessionError::MalformedSnapshot(_))
        ));
        assert_eq!(session.stage(), Stage::Onboarding);
        assert!(session.pages().is_empty());
    }

    #[test]
    fn overlong_snapshot_rejected() {
        let mut original = started(12);
        while !matches!(step(&mut original), Advance::Ended) {}
        let mut saved = original.finish(now()).unwrap().unwrap();
        let mut extra = saved.pages[9].clone();
        extra.page_number = 11;
        saved.pages.push(extra);

        let mut session = session(13);
        assert!(matches!(
            session.load(&saved),
            Err(SessionError::MalformedSnapshot(_))
        ));
    }

    #[test]
    fn browsing_back_then_forward_does_not_generate() {
        let mut session = started(16);
        step(&mut session);
        step(&mut session);
        assert_eq!(session.go_back(), Ok(Some(1)));
        assert_eq!(session.go_back(), Ok(Some(0)));
        assert_eq!(session.go_back(), Ok(None));
        assert_eq!(session.advance(), Ok(Advance::Turned { index: 1 }));
        assert_eq!(session.advance(), Ok(Advance::Turned { index: 2 }));
        assert_eq!(session.pages().len(), 3);
    }

    #[test]
    fn previous_context_uses_last_three_pages() {
        let mut session = started(17);
        for _ in 0..4 {
            step(&mut session);
        }
        assert_eq!(
            session.previous_context(),
            "Text of page 3. Text of page 4. Text of page 5."
        );
    }

    #[test]
    fn exhausted_pool_skips_the_draw() {
        let catalog = Catalog::parse_ron(
            r#"Catalog(
                heroes: [(id: "jules", name: "Jules", power: "p", ai_instruction: "i",
                          portrait: "j.png", kind: PRESET)],
                worlds: [(id: "sky-island", name: "Sky Island", description: "Clouds.")],
            )"#,
        )
        .unwrap();
        let mut session = Session::new(Arc::new(catalog), StoryConfig::default(), 1);
        let hero = session.catalog().hero(&HeroId::from("jules")).unwrap().clone();
        let ticket = session.begin(hero, &sky(), None).unwrap();
        session
            .complete(&ticket, content(&ticket, CompanionStatus::Stays))
            .unwrap();

        match session.advance().unwrap() {
            Advance::Generate(ticket) => {
                assert!(ticket.request.card.is_none());
                assert_eq!(ticket.page_number(), 2);
            }
            other => panic!("expected generation, got {:?}", other),
        }
    }

    #[test]
    fn stars_accumulate() {
        let mut session = started(18);
        assert_eq!(session.collect_star(), 1);
        assert_eq!(session.collect_star(), 2);
        let saved = session.snapshot(false, now()).unwrap();
        assert_eq!(saved.stars_collected, 2);
    }
}
