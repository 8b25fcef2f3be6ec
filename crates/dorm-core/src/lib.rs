//! Core domain + application logic for the dormitory assistant bot.
//!
//! This crate is framework-agnostic. Telegram lives behind the messaging port
//! (implemented in `dorm-telegram`); SQLite and PostgreSQL live behind the
//! `store::Store` trait.

pub mod broadcast;
pub mod config;
pub mod conversation;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod feedback;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod stats;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
