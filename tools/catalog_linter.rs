/// Catalog Linter: checks card packs for gaps the draw engine would hit.
///
/// Usage: catalog_linter [<catalog.ron or dir>...] [--config <story_config.ron>] [--no-builtin]

use std::path::Path;
use std::process;
use storybook_engine::core::catalog::Catalog;
use storybook_engine::core::config::StoryConfig;
use storybook_engine::schema::card::Rarity;
use storybook_engine::schema::hero::HeroKind;
use storybook_engine::schema::phase::Phase;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!(
            "Usage: catalog_linter [<catalog.ron or dir>...] [--config <story_config.ron>] [--no-builtin]"
        );
        process::exit(0);
    }

    let mut packs = Vec::new();
    let mut config_path = None;
    let mut builtin = true;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--no-builtin" => builtin = false,
            other => packs.push(other.to_string()),
        }
        i += 1;
    }

    let config = match config_path {
        Some(ref path) => match StoryConfig::load_from_ron(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("ERROR: Failed to load config: {}", e);
                process::exit(1);
            }
        },
        None => StoryConfig::default(),
    };

    let mut catalog = if builtin {
        match Catalog::sky_island() {
            Ok(c) => c,
            Err(e) => {
                eprintln!("ERROR: Built-in catalog is invalid: {}", e);
                process::exit(1);
            }
        }
    } else {
        Catalog::default()
    };

    for pack in &packs {
        let path = Path::new(pack);
        if path.is_file() {
            load_pack(path, &mut catalog);
        } else if path.is_dir() {
            load_packs_recursive(path, &mut catalog);
        } else {
            eprintln!("ERROR: Path '{}' does not exist", pack);
            process::exit(1);
        }
    }

    println!(
        "Loaded {} heroes, {} worlds, {} cards",
        catalog.heroes().len(),
        catalog.worlds().len(),
        catalog.cards().len()
    );

    let (errors, warnings) = lint_catalog(&catalog, &config);

    println!("\n=== Catalog Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn load_pack(path: &Path, catalog: &mut Catalog) {
    match Catalog::load_from_ron(path) {
        Ok(pack) => {
            println!("  Loaded: {}", path.display());
            catalog.merge(pack);
        }
        Err(e) => {
            eprintln!("  ERROR loading {}: {}", path.display(), e);
        }
    }
}

fn load_packs_recursive(dir: &Path, catalog: &mut Catalog) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                load_packs_recursive(&path, catalog);
            } else if path.extension().and_then(|s| s.to_str()) == Some("ron")
                && path.file_stem().and_then(|s| s.to_str()) != Some("story_config")
            {
                load_pack(&path, catalog);
            }
        }
    }
}

fn lint_catalog(catalog: &Catalog, config: &StoryConfig) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Err(e) = catalog.validate() {
        errors.push(e.to_string());
    }
    if let Err(e) = config.validate() {
        errors.push(e.to_string());
    }

    // Phases a draw can actually open for.
    let mut draw_phases: Vec<Phase> = config
        .draw_trigger_pages
        .iter()
        .map(|page| config.phase_for(page + 1))
        .collect();
    draw_phases.dedup();

    for world in catalog.worlds() {
        for &phase in &draw_phases {
            let total = catalog.cards_for(phase, None, &world.id).count();
            if total == 0 {
                errors.push(format!(
                    "World '{}' has no {} cards but a draw opens in that phase",
                    world.id, phase
                ));
                continue;
            }
            for rarity in Rarity::ALL {
                let count = catalog.cards_for(phase, Some(rarity), &world.id).count();
                if count < config.offer_size {
                    warnings.push(format!(
                        "World '{}' {} {}: {} cards, fewer than an offer of {}",
                        world.id, phase, rarity, count, config.offer_size
                    ));
                }
            }
        }

        let gold_heroes = catalog
            .cards_for(Phase::Adventure, Some(Rarity::Gold), &world.id)
            .filter(|c| c.is_hero_unlock())
            .count();
        if gold_heroes == 0 && draw_phases.contains(&Phase::Adventure) {
            warnings.push(format!(
                "World '{}' has no GOLD ADVENTURE hero cards; the guaranteed reveal can miss",
                world.id
            ));
        }
    }

    for hero in catalog.heroes_of_kind(HeroKind::Unlockable) {
        if catalog.unlock_card_for(&hero.id).is_none() {
            warnings.push(format!(
                "Unlockable hero '{}' has no card that unlocks it",
                hero.id
            ));
        }
    }

    (errors, warnings)
}
