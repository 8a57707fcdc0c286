pub mod book;
pub mod catalog;
pub mod config;
pub mod draw;
pub mod gateway;
pub mod ledger;
pub mod onboarding;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod storyteller;
