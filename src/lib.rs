//! SpTube - Telegram bot for downloading music, videos and social media
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and small helpers
//! - `provider`: query classification and the remote track provider
//! - `download`: track, video and playlist downloads
//! - `telegram`: bot setup, handlers and media delivery
//! - `cli`: command-line entry points

#![allow(clippy::too_many_arguments)]

pub mod cli;
pub mod core;
pub mod download;
pub mod provider;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult, Config};
pub use download::Downloader;
pub use provider::ProviderClient;
pub use telegram::{create_bot, schema, HandlerDeps};
