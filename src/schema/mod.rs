pub mod card;
pub mod hero;
pub mod page;
pub mod phase;
pub mod world;
