/// Catalog and config data tests: the shipped RON files load and hang together.

use rustc_hash::FxHashSet;
use storybook_engine::core::catalog::Catalog;
use storybook_engine::core::config::StoryConfig;
use storybook_engine::schema::card::Rarity;
use storybook_engine::schema::hero::HeroKind;
use storybook_engine::schema::phase::Phase;
use storybook_engine::schema::world::WorldId;

#[test]
fn sky_island_catalog_loads_from_disk() {
    let catalog =
        Catalog::load_from_ron(std::path::Path::new("catalog_data/sky_island.ron")).unwrap();
    catalog.validate().unwrap();

    assert_eq!(catalog.heroes_of_kind(HeroKind::Preset).count(), 3);
    assert_eq!(catalog.heroes_of_kind(HeroKind::Unlockable).count(), 7);
    assert_eq!(catalog.worlds().len(), 3);
    assert!(!catalog.world(&WorldId::from("sky-island")).unwrap().locked);
    assert!(catalog.world(&WorldId::from("neon-city")).unwrap().locked);
}

#[test]
fn sky_island_buckets_keep_full_size() {
    let catalog = Catalog::sky_island().unwrap();
    let sky = WorldId::from("sky-island");

    for phase in Phase::ALL {
        for rarity in Rarity::ALL {
            let cards: Vec<_> = catalog.cards_for(phase, Some(rarity), &sky).collect();
            let heroes = cards.iter().filter(|c| c.is_hero_unlock()).count();
            let (expected_cards, expected_heroes) = match (phase, rarity) {
                (Phase::Adventure, Rarity::Gold) => (18, 4),
                (Phase::Climax, Rarity::Platinum) => (18, 3),
                _ => (15, 0),
            };
            assert_eq!(cards.len(), expected_cards, "{} {}", phase, rarity);
            assert_eq!(heroes, expected_heroes, "{} {}", phase, rarity);
        }
    }
    assert_eq!(catalog.cards().len(), 186);
}

#[test]
fn story_config_file_matches_defaults() {
    let config =
        StoryConfig::load_from_ron(std::path::Path::new("catalog_data/story_config.ron")).unwrap();
    assert_eq!(config, StoryConfig::default());
}

#[test]
fn hero_cards_sit_where_the_draw_looks_for_them() {
    let catalog = Catalog::sky_island().unwrap();
    let sky = WorldId::from("sky-island");

    // The guaranteed-hero fallback searches the GOLD pool of ADVENTURE.
    let gold_heroes = catalog
        .cards_for(Phase::Adventure, Some(Rarity::Gold), &sky)
        .filter(|c| c.is_hero_unlock())
        .count();
    assert!(gold_heroes >= 1);

    // No hero cards leak into the opening or the ending.
    for phase in [Phase::Setup, Phase::Resolution] {
        assert_eq!(
            catalog
                .cards_for(phase, None, &sky)
                .filter(|c| c.is_hero_unlock())
                .count(),
            0,
            "{}",
            phase
        );
    }
}

#[test]
fn every_unlockable_hero_has_exactly_one_card() {
    let catalog = Catalog::sky_island().unwrap();
    let mut seen = FxHashSet::default();
    for card in catalog.cards() {
        if let Some(hero) = &card.unlocks_hero_id {
            assert!(seen.insert(hero.clone()), "{} unlocked twice", hero);
        }
    }
    assert_eq!(seen.len(), catalog.heroes_of_kind(HeroKind::Unlockable).count());
}

#[test]
fn card_pack_merges_over_builtin() {
    let mut catalog = Catalog::sky_island().unwrap();
    let before = catalog.cards().len();
    let pack = Catalog::parse_ron(
        r#"Catalog(
            worlds: [(id: "neon-city", name: "Neon City",
                      description: "A cyberpunk city run by robot cats.", locked: false)],
            cards: [
                (id: "nc_s_s1", name: "The Purring Drone", description: "A drone purrs hello.",
                 rarity: SILVER, phase: SETUP, world_id: Some("neon-city")),
            ],
        )"#,
    )
    .unwrap();
    catalog.merge(pack);
    catalog.validate().unwrap();

    assert_eq!(catalog.cards().len(), before + 1);
    assert!(!catalog.world(&WorldId::from("neon-city")).unwrap().locked);
    let neon_id = WorldId::from("neon-city");
    let neon: Vec<_> = catalog
        .cards_for(Phase::Setup, None, &neon_id)
        .collect();
    assert_eq!(neon.len(), 1);
}
