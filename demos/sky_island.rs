/// Sky Island walkthrough: Jules plays a whole story, meets a companion,
/// and the finished book is printed.
///
/// Run with: cargo run --example sky_island

use futures::executor::block_on;
use storybook_engine::core::gateway::ScriptedGateway;
use storybook_engine::core::store::MemoryStore;
use storybook_engine::core::storyteller::{Progress, StorytellerBuilder};
use storybook_engine::schema::hero::HeroId;
use storybook_engine::schema::world::WorldId;

fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let mut teller = StorytellerBuilder::new()
        .seed(2026)
        .build(ScriptedGateway::new(), MemoryStore::new())
        .expect("Failed to build storyteller");

    println!("=== Sky Island ===");
    println!("Coins: {}\n", teller.ledger().coins());

    let first = block_on(teller.start_session(
        &HeroId::from("jules"),
        &WorldId::from("sky-island"),
        Some("Grandpa Joe"),
    ))
    .expect("Failed to start story");
    println!("[{}] {}", first.page_number, first.text);

    loop {
        let progress = block_on(teller.advance_page()).expect("Failed to turn page");
        match progress {
            Progress::DrawOpened(offer) => {
                // Prefer a hero card when one shows up.
                let card = offer
                    .cards
                    .iter()
                    .find(|c| c.is_hero_unlock())
                    .unwrap_or(&offer.cards[0])
                    .clone();
                println!(
                    "    draw: {} -> {}",
                    offer
                        .cards
                        .iter()
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(" | "),
                    card.name
                );
                let page = block_on(teller.select_card(&card.id)).expect("Failed to play card");
                println!("[{}] {}", page.page_number, page.text);
            }
            Progress::PageWritten(page) => {
                teller.collect_star();
                println!("[{}] {}", page.page_number, page.text);
            }
            Progress::Ended { snapshot_id } => {
                println!("\nSaved as {:?}", snapshot_id);
                break;
            }
            Progress::Turned { .. } | Progress::Stayed => {}
        }
    }

    println!(
        "Unlocked heroes: {:?}",
        teller
            .ledger()
            .unlocked_heroes()
            .iter()
            .map(|h| h.0.as_str())
            .collect::<Vec<_>>()
    );
    println!("Coins left: {}\n", teller.ledger().coins());

    if let Some(book) = teller.export_book() {
        print!("{}", book.to_plain_text());
    }
}
