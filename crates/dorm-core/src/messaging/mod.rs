//! Outbound messaging abstractions (Telegram today, anything with chats later).

pub mod port;
pub mod throttled;
pub mod types;
