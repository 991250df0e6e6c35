//! Handler types and dependencies

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use teloxide::prelude::*;
use teloxide::types::Me;

use crate::core::config::Config;
use crate::core::error::AppError;
use crate::download::Downloader;
use crate::provider::ProviderClient;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub config: Arc<Config>,
    pub downloader: Downloader,
    pub bot_username: String,
    pub bot_name: String,
    pub bot_id: UserId,
    pub started_at: Instant,
    /// Wall-clock start time shown by /ping
    pub started_on: DateTime<Utc>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(config: Arc<Config>, downloader: Downloader, me: &Me) -> Self {
        Self {
            config,
            downloader,
            bot_username: me.username().to_string(),
            bot_name: me.first_name.clone(),
            bot_id: me.id,
            started_at: Instant::now(),
            started_on: Utc::now(),
        }
    }

    /// Builds dependencies without asking Telegram who the bot is.
    pub fn with_identity(config: Arc<Config>, downloader: Downloader, bot_username: &str, bot_id: UserId) -> Self {
        Self {
            config,
            downloader,
            bot_username: bot_username.to_string(),
            bot_name: bot_username.to_string(),
            bot_id,
            started_at: Instant::now(),
            started_on: Utc::now(),
        }
    }

    pub fn provider(&self) -> &ProviderClient {
        self.downloader.provider()
    }
}

/// Sender id of a message, 0 when the sender is unknown (channel posts).
pub fn sender_id(msg: &Message) -> u64 {
    msg.from.as_ref().map(|u| u.id.0).unwrap_or(0)
}

/// Replies to `msg` with the chat-visible form of `err`.
pub(super) async fn report_error(bot: &Bot, msg: &Message, context: &str, err: &AppError) {
    log::error!("{} failed in chat {}: {}", context, msg.chat.id, err);
    if let Err(e) = bot
        .send_message(msg.chat.id, err.user_message())
        .reply_parameters(teloxide::types::ReplyParameters::new(msg.id))
        .await
    {
        log::warn!("Failed to report error to chat {}: {}", msg.chat.id, e);
    }
}
