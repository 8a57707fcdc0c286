//! Static catalogs: heroes, worlds and destiny cards, loaded from RON.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::schema::card::{CardData, CardId, Rarity};
use crate::schema::hero::{Hero, HeroId, HeroKind};
use crate::schema::phase::Phase;
use crate::schema::world::{World, WorldId};

/// The catalog shipped with the crate.
pub const SKY_ISLAND_RON: &str = include_str!("../../catalog_data/sky_island.ron");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("duplicate card id: {0}")]
    DuplicateCard(CardId),
    #[error("duplicate hero id: {0}")]
    DuplicateHero(HeroId),
    #[error("duplicate world id: {0}")]
    DuplicateWorld(WorldId),
    #[error("card '{card}' unlocks unknown hero '{hero}'")]
    UnknownUnlockHero { card: CardId, hero: HeroId },
    #[error("card '{card}' unlocks hero '{hero}', which is not unlockable")]
    NotUnlockable { card: CardId, hero: HeroId },
    #[error("card '{card}' belongs to unknown world '{world}'")]
    UnknownWorld { card: CardId, world: WorldId },
}

// RON shape of a catalog file. Every section is optional so that card
// packs can be merged on top of a base catalog.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "Catalog")]
struct RonCatalog {
    #[serde(default)]
    heroes: Vec<Hero>,
    #[serde(default)]
    worlds: Vec<World>,
    #[serde(default)]
    cards: Vec<CardData>,
}

/// Immutable lookup tables for heroes, worlds and cards.
///
/// Card order is preserved from the source files; it is the "catalog
/// order" the draw engine starts from.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    heroes: Vec<Hero>,
    worlds: Vec<World>,
    cards: Vec<CardData>,
    hero_index: FxHashMap<HeroId, usize>,
    world_index: FxHashMap<WorldId, usize>,
    card_index: FxHashMap<CardId, usize>,
}

impl Catalog {
    /// The built-in Sky Island catalog, fully validated.
    pub fn sky_island() -> Result<Catalog, CatalogError> {
        let catalog = Self::parse_ron(SKY_ISLAND_RON)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load_from_ron(path: &Path) -> Result<Catalog, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a catalog from a RON string.
    ///
    /// Only duplicate ids are rejected here; cross references are checked
    /// by [`Catalog::validate`] once all packs have been merged.
    pub fn parse_ron(input: &str) -> Result<Catalog, CatalogError> {
        let raw: RonCatalog = ron::from_str(input)?;
        Self::from_parts(raw.heroes, raw.worlds, raw.cards)
    }

    pub fn from_parts(
        heroes: Vec<Hero>,
        worlds: Vec<World>,
        cards: Vec<CardData>,
    ) -> Result<Catalog, CatalogError> {
        let mut catalog = Catalog {
            heroes,
            worlds,
            cards,
            ..Default::default()
        };

        for (i, hero) in catalog.heroes.iter().enumerate() {
            if catalog.hero_index.insert(hero.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateHero(hero.id.clone()));
            }
        }
        for (i, world) in catalog.worlds.iter().enumerate() {
            if catalog.world_index.insert(world.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateWorld(world.id.clone()));
            }
        }
        for (i, card) in catalog.cards.iter().enumerate() {
            if catalog.card_index.insert(card.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateCard(card.id.clone()));
            }
        }

        Ok(catalog)
    }

    /// Merge another catalog into this one. Entries from `other` replace
    /// entries with the same id in place; new entries are appended.
    pub fn merge(&mut self, other: Catalog) {
        for hero in other.heroes {
            match self.hero_index.get(&hero.id) {
                Some(&i) => self.heroes[i] = hero,
                None => {
                    self.hero_index.insert(hero.id.clone(), self.heroes.len());
                    self.heroes.push(hero);
                }
            }
        }
        for world in other.worlds {
            match self.world_index.get(&world.id) {
                Some(&i) => self.worlds[i] = world,
                None => {
                    self.world_index.insert(world.id.clone(), self.worlds.len());
                    self.worlds.push(world);
                }
            }
        }
        for card in other.cards {
            match self.card_index.get(&card.id) {
                Some(&i) => self.cards[i] = card,
                None => {
                    self.card_index.insert(card.id.clone(), self.cards.len());
                    self.cards.push(card);
                }
            }
        }
    }

    /// Check that every card references a known world and an unlockable hero.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for card in &self.cards {
            if let Some(world) = &card.world_id {
                if !self.world_index.contains_key(world) {
                    return Err(CatalogError::UnknownWorld {
                        card: card.id.clone(),
                        world: world.clone(),
                    });
                }
            }
            if let Some(hero_id) = &card.unlocks_hero_id {
                match self.hero(hero_id) {
                    None => {
                        return Err(CatalogError::UnknownUnlockHero {
                            card: card.id.clone(),
                            hero: hero_id.clone(),
                        })
                    }
                    Some(hero) if hero.kind != HeroKind::Unlockable => {
                        return Err(CatalogError::NotUnlockable {
                            card: card.id.clone(),
                            hero: hero_id.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    pub fn heroes(&self) -> &[Hero] {
        &self.heroes
    }

    pub fn worlds(&self) -> &[World] {
        &self.worlds
    }

    pub fn cards(&self) -> &[CardData] {
        &self.cards
    }

    pub fn hero(&self, id: &HeroId) -> Option<&Hero> {
        self.hero_index.get(id).map(|&i| &self.heroes[i])
    }

    pub fn world(&self, id: &WorldId) -> Option<&World> {
        self.world_index.get(id).map(|&i| &self.worlds[i])
    }

    pub fn card(&self, id: &CardId) -> Option<&CardData> {
        self.card_index.get(id).map(|&i| &self.cards[i])
    }

    pub fn heroes_of_kind(&self, kind: HeroKind) -> impl Iterator<Item = &Hero> {
        self.heroes.iter().filter(move |h| h.kind == kind)
    }

    /// Cards for a phase in a world (world-agnostic cards included),
    /// optionally restricted to one rarity. Yields in catalog order.
    pub fn cards_for<'a>(
        &'a self,
        phase: Phase,
        rarity: Option<Rarity>,
        world: &'a WorldId,
    ) -> impl Iterator<Item = &'a CardData> + 'a {
        self.cards.iter().filter(move |c| {
            c.phase == phase
                && c.available_in(world)
                && rarity.map_or(true, |r| c.rarity == r)
        })
    }

    /// Resolve used card ids back to cards, keeping selection order and
    /// skipping ids no longer in the catalog.
    pub fn collected_cards(&self, used: &[CardId]) -> Vec<&CardData> {
        used.iter().filter_map(|id| self.card(id)).collect()
    }

    /// The card that unlocks the given hero, if any.
    pub fn unlock_card_for(&self, hero: &HeroId) -> Option<&CardData> {
        self.cards
            .iter()
            .find(|c| c.unlocks_hero_id.as_ref() == Some(hero))
    }
}
