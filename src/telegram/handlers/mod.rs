//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the Telegram bot.
//! The handlers are organized in a testable way, allowing integration tests
//! to call the same handler functions as production code.

mod callbacks;
mod commands;
mod inline;
mod messages;
mod owner;
mod schema;
mod snap;
mod types;

pub use callbacks::{handle_callback, handle_track_callback};
pub use inline::{handle_chosen_inline_result, handle_inline_query, inline_results, track_article};
pub use messages::{handle_passive, handle_track_query, lookup};
pub use owner::trigger_restart;
pub use schema::schema;
pub use snap::handle_snap;
pub use types::{sender_id, HandlerDeps, HandlerError};
