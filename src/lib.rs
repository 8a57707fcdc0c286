//! Storybook Engine: the story-progression core of an interactive
//! children's picture book.
//!
//! A reader picks a hero and a world, then walks a fixed ten-page arc.
//! At checkpoint pages a small hand of destiny cards is drawn; the chosen
//! card steers the next generated page and may bring a companion hero
//! along. Text and illustrations come from an injected content gateway,
//! progress from an injected key-value store.

pub mod core;
pub mod schema;
