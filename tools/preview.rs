/// Preview: interactive story shell backed by the scripted gateway.
///
/// Usage: preview [--store <file.json>] [--config <story_config.ron>] [--pack <catalog.ron>]... [--seed <n>]
///
/// Commands:
///   heroes                      list heroes and whether they are available
///   worlds                      list worlds
///   start <hero> [world] [author] spend a coin and write page 1
///   next                        turn the page (may open a draw)
///   back                        previous page
///   pick <n>                    play card n from the open draw
///   star                        collect a star
///   coins / topup <n>           wallet
///   save / end                  save and exit, or finish the story
///   library / load <n>          saved stories
///   book                        print the current story as a book
///   help                        list commands
///   quit                        exit

use futures::executor::block_on;
use std::io::{self, BufRead, Write};
use std::path::Path;
use storybook_engine::core::gateway::ScriptedGateway;
use storybook_engine::core::session::Stage;
use storybook_engine::core::store::{JsonFileStore, KeyValueStore, MemoryStore};
use storybook_engine::core::storyteller::{Progress, Storyteller, StorytellerBuilder};
use storybook_engine::schema::hero::HeroId;
use storybook_engine::schema::page::StoryPage;
use storybook_engine::schema::world::WorldId;
use tracing_subscriber::EnvFilter;

type Shell = Storyteller<ScriptedGateway, Box<dyn KeyValueStore>>;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let mut store_path = None;
    let mut config_path = None;
    let mut packs = Vec::new();
    let mut seed: u64 = 42;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--store" if i + 1 < args.len() => {
                i += 1;
                store_path = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--pack" if i + 1 < args.len() => {
                i += 1;
                packs.push(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let store: Box<dyn KeyValueStore> = match store_path {
        Some(ref path) => match JsonFileStore::open(Path::new(path)) {
            Ok(store) => Box::new(store),
            Err(e) => {
                eprintln!("ERROR: Failed to open store: {}", e);
                std::process::exit(1);
            }
        },
        None => Box::new(MemoryStore::new()),
    };

    let mut builder = StorytellerBuilder::new().seed(seed);
    if let Some(ref path) = config_path {
        builder = builder.config_path(Path::new(path));
    }
    for pack in &packs {
        builder = builder.catalog_pack(Path::new(pack));
    }
    let mut teller: Shell = match builder.build(ScriptedGateway::new(), store) {
        Ok(teller) => teller,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "Loaded {} heroes, {} cards",
        teller.catalog().heroes().len(),
        teller.catalog().cards().len()
    );
    println!("Seed: {}", seed);
    if teller.is_first_time() {
        println!("Welcome! Pick a hero with 'heroes', then 'start <hero>'.");
    }
    println!("Type 'help' for commands.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("story> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                if let Some(id) = teller.save_and_exit() {
                    println!("Saved story {}", id);
                }
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "heroes" => {
                for hero in teller.catalog().heroes() {
                    let open = teller.ledger().is_available(hero);
                    println!(
                        "  {} {:<10} {:<18} {}",
                        hero.emoji,
                        hero.id,
                        hero.power,
                        if open { "" } else { "(locked)" }
                    );
                }
            }
            "worlds" => {
                for world in teller.catalog().worlds() {
                    println!(
                        "  {:<12} {}{}",
                        world.id,
                        world.name,
                        if world.locked { " (locked)" } else { "" }
                    );
                }
            }
            "start" => {
                if parts.len() < 2 {
                    println!("Usage: start <hero> [world] [author]");
                    continue;
                }
                let world = WorldId::from(parts.get(2).copied().unwrap_or("sky-island"));
                let author = parts.get(3).copied();
                match block_on(teller.start_session(&HeroId::from(parts[1]), &world, author)) {
                    Ok(page) => {
                        print_page(&page);
                        println!("  ({} coins left)", teller.ledger().coins());
                    }
                    Err(e) => println!("Cannot start: {}", e),
                }
            }
            "next" | "n" => match block_on(teller.advance_page()) {
                Ok(progress) => print_progress(&teller, progress),
                Err(e) => println!("{}", e),
            },
            "back" | "b" => match teller.go_back() {
                Ok(Some(index)) => print_page(&teller.session().pages()[index]),
                Ok(None) => println!("Already at the first page."),
                Err(e) => println!("{}", e),
            },
            "pick" | "p" => {
                let n: usize = match parts.get(1).and_then(|s| s.parse().ok()) {
                    Some(n) if n >= 1 => n,
                    _ => {
                        println!("Usage: pick <n>");
                        continue;
                    }
                };
                let card_id = match teller
                    .session()
                    .pending_draw()
                    .and_then(|offer| offer.cards.get(n - 1))
                {
                    Some(card) => card.id.clone(),
                    None => {
                        println!("No card {} on offer.", n);
                        continue;
                    }
                };
                match block_on(teller.select_card(&card_id)) {
                    Ok(page) => {
                        print_page(&page);
                        if let Some(companion) = teller.session().companion_hero() {
                            println!("  Companion: {} {}", companion.emoji, companion.name);
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
            "star" => println!("Stars: {}", teller.collect_star()),
            "coins" => println!("Coins: {}", teller.ledger().coins()),
            "topup" => {
                let amount = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(3);
                println!("Coins: {}", teller.top_up(amount));
            }
            "save" => match teller.save_and_exit() {
                Some(id) => println!("Saved story {}", id),
                None => println!("Nothing to save."),
            },
            "end" => match teller.end_story() {
                Ok(Some(id)) => println!("Finished story {}", id),
                Ok(None) => println!("Story already saved."),
                Err(e) => println!("{}", e),
            },
            "library" | "l" => {
                if teller.library().is_empty() {
                    println!("No saved stories.");
                }
                for (i, story) in teller.library().list().iter().enumerate() {
                    println!(
                        "  {}. {}, {} pages, {} [{}]",
                        i + 1,
                        story.hero.name,
                        story.pages.len(),
                        story.timestamp.format("%Y-%m-%d %H:%M"),
                        if story.is_finished { "finished" } else { "in progress" }
                    );
                }
            }
            "load" => {
                let id = match parts
                    .get(1)
                    .and_then(|s| s.parse::<usize>().ok())
                    .and_then(|n| teller.library().list().get(n.wrapping_sub(1)))
                {
                    Some(story) => story.id.clone(),
                    None => {
                        println!("Usage: load <n> (see 'library')");
                        continue;
                    }
                };
                match teller.load_session(&id) {
                    Ok(stage) => {
                        if let Some(page) = teller.session().current_page() {
                            print_page(page);
                        }
                        if stage == Stage::Reading {
                            println!("  (read-only)");
                        }
                    }
                    Err(e) => println!("Cannot load: {}", e),
                }
            }
            "book" => match teller.export_book() {
                Some(book) => {
                    println!("--- {} ---", book.file_stem());
                    print!("{}", book.to_plain_text());
                }
                None => println!("No story to export."),
            },
            _ => {
                println!("Unknown command: {}. Type 'help' for commands.", cmd);
            }
        }
    }
}

fn print_progress(teller: &Shell, progress: Progress) {
    match progress {
        Progress::Turned { index } => print_page(&teller.session().pages()[index]),
        Progress::Stayed => println!("That was the last page."),
        Progress::PageWritten(page) => print_page(&page),
        Progress::DrawOpened(offer) => {
            println!("Destiny draw ({}, aiming for {}):", offer.phase, offer.target_rarity);
            for (i, card) in offer.cards.iter().enumerate() {
                let marker = if card.is_hero_unlock() { " [hero]" } else { "" };
                println!(
                    "  {}. {:<28} {:<8} {}{}",
                    i + 1,
                    card.name,
                    card.rarity,
                    card.description,
                    marker
                );
            }
        }
        Progress::Ended { snapshot_id } => {
            println!("The End. Stars: {}", teller.session().stars());
            if let Some(id) = snapshot_id {
                println!("Saved story {}", id);
            }
        }
    }
}

fn print_page(page: &StoryPage) {
    println!("\n[Page {} · {}]", page.page_number, page.phase);
    if let Some(choice) = &page.user_choice {
        println!("  Decision: {}", choice);
    }
    println!("  {}", page.text);
    println!("  Illustration: {}\n", page.image);
}

fn print_usage() {
    println!("Preview: interactive story shell");
    println!();
    println!("Usage: preview [--store <file.json>] [--config <story_config.ron>] [--pack <catalog.ron>]... [--seed <n>]");
}

fn print_help() {
    println!("Commands:");
    println!("  heroes                        list heroes");
    println!("  worlds                        list worlds");
    println!("  start <hero> [world] [author] spend a coin and write page 1");
    println!("  next                          turn the page");
    println!("  back                          previous page");
    println!("  pick <n>                      play card n from the open draw");
    println!("  star                          collect a star");
    println!("  coins / topup <n>             wallet");
    println!("  save / end                    save and exit, or finish the story");
    println!("  library / load <n>            saved stories");
    println!("  book                          print the current story as a book");
    println!("  help                          this list");
    println!("  quit                          save and exit");
}
