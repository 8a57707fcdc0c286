//! Destiny-card draws: candidate filtering, hero guarantee/ban rules and
//! the target-rarity roll.

use rand::seq::SliceRandom;
use rand::Rng;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::catalog::Catalog;
use crate::schema::card::{CardData, CardId, Rarity};
use crate::schema::phase::Phase;
use crate::schema::world::WorldId;

/// Parameters of a single draw.
#[derive(Debug, Clone)]
pub struct DrawRequest<'a> {
    /// Phase of the page the chosen card will shape.
    pub phase: Phase,
    /// `None` draws from every rarity.
    pub target_rarity: Option<Rarity>,
    pub used: &'a FxHashSet<CardId>,
    pub guarantee_hero: bool,
    /// Takes precedence over `guarantee_hero`.
    pub ban_heroes: bool,
    pub world_id: &'a WorldId,
    pub offer_size: usize,
}

/// The hand of cards presented to the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawOffer {
    pub phase: Phase,
    pub target_rarity: Rarity,
    pub cards: Vec<CardData>,
}

impl DrawOffer {
    pub fn contains(&self, id: &CardId) -> bool {
        self.cards.iter().any(|c| &c.id == id)
    }

    pub fn card(&self, id: &CardId) -> Option<&CardData> {
        self.cards.iter().find(|c| &c.id == id)
    }

    /// True if any offered card would unlock a hero.
    pub fn has_hero_card(&self) -> bool {
        self.cards.iter().any(CardData::is_hero_unlock)
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Draw up to `offer_size` cards.
///
/// The returned order is shuffled and carries no meaning. Fewer cards (or
/// none) come back when the eligible pool is exhausted.
pub fn draw<R: Rng + ?Sized>(
    catalog: &Catalog,
    request: &DrawRequest<'_>,
    rng: &mut R,
) -> Vec<CardData> {
    let mut pool: Vec<&CardData> = catalog
        .cards_for(request.phase, request.target_rarity, request.world_id)
        .filter(|c| !request.used.contains(&c.id))
        .filter(|c| !(request.ban_heroes && c.is_hero_unlock()))
        .collect();
    pool.shuffle(rng);

    let mut selection: Vec<&CardData> = Vec::with_capacity(request.offer_size);

    if request.guarantee_hero && !request.ban_heroes {
        let forced = match pool.iter().position(|c| c.is_hero_unlock()) {
            Some(i) => Some(pool.remove(i)),
            None => {
                let mut gold: Vec<&CardData> = catalog
                    .cards_for(request.phase, Some(Rarity::Gold), request.world_id)
                    .collect();
                gold.shuffle(rng);
                gold.into_iter()
                    .find(|c| c.is_hero_unlock() && !request.used.contains(&c.id))
            }
        };
        if let Some(card) = forced {
            debug!(card = %card.id, "hero card guaranteed");
            pool.retain(|c| c.id != card.id);
            selection.push(card);
        }
    }

    let remaining = request.offer_size.saturating_sub(selection.len());
    selection.extend(pool.into_iter().take(remaining));
    selection.shuffle(rng);

    debug!(
        phase = %request.phase,
        rarity = ?request.target_rarity,
        offered = selection.len(),
        "cards drawn"
    );
    selection.into_iter().cloned().collect()
}

/// Roll the rarity of the next draw.
///
/// Uniform over the three tiers, except that an ADVENTURE draw before any
/// hero has been met flips between GOLD and PLATINUM, where the hero
/// cards live.
pub fn roll_target_rarity<R: Rng + ?Sized>(
    next_phase: Phase,
    hero_encountered: bool,
    rng: &mut R,
) -> Rarity {
    if next_phase == Phase::Adventure && !hero_encountered {
        if rng.gen_bool(0.5) {
            Rarity::Gold
        } else {
            Rarity::Platinum
        }
    } else {
        Rarity::ALL[rng.gen_range(0..Rarity::ALL.len())]
    }
}
