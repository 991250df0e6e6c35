//! Telegram bot integration and handlers

pub mod bot;
pub mod delivery;
pub mod filters;
pub mod handlers;
pub mod markup;
pub mod status;
pub mod token;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
