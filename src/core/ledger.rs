//! Wallet and hero-unlock ledger. Lives outside any one session.

use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::store::{self, KeyValueStore, HERO_UNLOCKS_KEY, WALLET_KEY};
use crate::schema::hero::{Hero, HeroId, HeroKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("not enough coins: balance is {balance}")]
    InsufficientFunds { balance: u32 },
}

/// Coin balance plus the set of heroes unlocked so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    coins: u32,
    starting_coins: u32,
    unlocked: FxHashSet<HeroId>,
}

impl Ledger {
    /// A fresh ledger for a new reader.
    pub fn new(starting_coins: u32) -> Self {
        Self {
            coins: starting_coins,
            starting_coins,
            unlocked: FxHashSet::default(),
        }
    }

    /// Load the ledger from a store. An absent or unreadable balance
    /// falls back to `starting_coins`.
    pub fn load<S: KeyValueStore + ?Sized>(store: &S, starting_coins: u32) -> Self {
        let coins = store::load_json::<u32, _>(store, WALLET_KEY).unwrap_or(starting_coins);
        let unlocked: Vec<HeroId> = store::load_json(store, HERO_UNLOCKS_KEY).unwrap_or_default();
        debug!(coins, unlocked = unlocked.len(), "ledger loaded");
        Self {
            coins,
            starting_coins,
            unlocked: unlocked.into_iter().collect(),
        }
    }

    /// Write balance and unlocks back, best-effort.
    pub fn persist<S: KeyValueStore + ?Sized>(&self, store: &mut S) {
        store::save_json(store, WALLET_KEY, &self.coins);
        store::save_json(store, HERO_UNLOCKS_KEY, &self.unlocked_heroes());
    }

    pub fn coins(&self) -> u32 {
        self.coins
    }

    /// Starting or resuming a story needs at least one coin.
    pub fn can_afford_story(&self) -> bool {
        self.coins >= 1
    }

    pub fn ensure_can_afford(&self) -> Result<(), LedgerError> {
        if self.can_afford_story() {
            Ok(())
        } else {
            Err(LedgerError::InsufficientFunds {
                balance: self.coins,
            })
        }
    }

    /// Take one coin. Returns the new balance.
    pub fn spend_coin(&mut self) -> Result<u32, LedgerError> {
        self.ensure_can_afford()?;
        self.coins -= 1;
        debug!(balance = self.coins, "coin spent");
        Ok(self.coins)
    }

    /// Add coins from a top-up. Returns the new balance.
    pub fn top_up(&mut self, amount: u32) -> u32 {
        self.coins = self.coins.saturating_add(amount);
        info!(amount, balance = self.coins, "wallet topped up");
        self.coins
    }

    /// Record a hero as unlocked. Returns false if it already was.
    pub fn unlock_hero(&mut self, hero: &HeroId) -> bool {
        let added = self.unlocked.insert(hero.clone());
        if added {
            info!(hero = %hero, "hero unlocked");
        }
        added
    }

    pub fn is_unlocked(&self, hero: &HeroId) -> bool {
        self.unlocked.contains(hero)
    }

    /// Unlocked hero ids, sorted for stable output.
    pub fn unlocked_heroes(&self) -> Vec<HeroId> {
        let mut ids: Vec<HeroId> = self.unlocked.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Whether the hero may be picked as protagonist.
    pub fn is_available(&self, hero: &Hero) -> bool {
        match hero.kind {
            HeroKind::Preset | HeroKind::Custom => true,
            HeroKind::Unlockable => self.is_unlocked(&hero.id),
        }
    }

    /// Forget every unlock and restore the starting balance.
    pub fn reset_progress(&mut self) {
        self.unlocked.clear();
        self.coins = self.starting_coins;
        info!("progress reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;

    fn hero(id: &str, kind: HeroKind) -> Hero {
        Hero {
            id: HeroId::from(id),
            name: id.to_string(),
            power: "p".to_string(),
            ai_instruction: "i".to_string(),
            portrait: format!("{}.png", id),
            emoji: String::new(),
            appearance: None,
            kind,
        }
    }

    #[test]
    fn spending_stops_at_zero() {
        let mut ledger = Ledger::new(1);
        assert_eq!(ledger.spend_coin(), Ok(0));
        assert_eq!(
            ledger.spend_coin(),
            Err(LedgerError::InsufficientFunds { balance: 0 })
        );
        assert_eq!(ledger.coins(), 0);
    }

    #[test]
    fn top_up_adds() {
        let mut ledger = Ledger::new(0);
        assert!(!ledger.can_afford_story());
        assert_eq!(ledger.top_up(5), 5);
        assert!(ledger.can_afford_story());
    }

    #[test]
    fn unlock_is_idempotent() {
        let mut ledger = Ledger::new(3);
        assert!(ledger.unlock_hero(&HeroId::from("bop")));
        assert!(!ledger.unlock_hero(&HeroId::from("bop")));
        assert_eq!(ledger.unlocked_heroes(), vec![HeroId::from("bop")]);
    }

    #[test]
    fn availability_by_kind() {
        let mut ledger = Ledger::new(3);
        let bop = hero("bop", HeroKind::Unlockable);
        assert!(ledger.is_available(&hero("jules", HeroKind::Preset)));
        assert!(ledger.is_available(&hero("custom-1", HeroKind::Custom)));
        assert!(!ledger.is_available(&bop));
        ledger.unlock_hero(&bop.id);
        assert!(ledger.is_available(&bop));
    }

    #[test]
    fn load_defaults_and_persist() {
        let mut store = MemoryStore::new();
        let mut ledger = Ledger::load(&store, 3);
        assert_eq!(ledger.coins(), 3);

        ledger.spend_coin().unwrap();
        ledger.unlock_hero(&HeroId::from("jet"));
        ledger.persist(&mut store);

        let reloaded = Ledger::load(&store, 3);
        assert_eq!(reloaded.coins(), 2);
        assert!(reloaded.is_unlocked(&HeroId::from("jet")));
    }

    #[test]
    fn unparseable_balance_uses_default() {
        let mut store = MemoryStore::new();
        store.set(WALLET_KEY, "NaN".to_string()).unwrap();
        assert_eq!(Ledger::load(&store, 3).coins(), 3);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut ledger = Ledger::new(3);
        ledger.spend_coin().unwrap();
        ledger.unlock_hero(&HeroId::from("coral"));
        ledger.reset_progress();
        assert_eq!(ledger.coins(), 3);
        assert!(ledger.unlocked_heroes().is_empty());
    }
}
