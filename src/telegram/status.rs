//! Status messages edited while a request runs, plus the periodic progress ticker.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode};
use teloxide::RequestError;
use tokio::task::JoinHandle;

use crate::download::Progress;

/// A message the bot can keep editing: a regular chat message or an inline result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTarget {
    Chat { chat_id: ChatId, message_id: MessageId },
    Inline(String),
}

impl MessageTarget {
    pub fn of(msg: &Message) -> Self {
        MessageTarget::Chat {
            chat_id: msg.chat.id,
            message_id: msg.id,
        }
    }

    /// Replaces the text (HTML) of the target message.
    pub async fn edit_text(&self, bot: &Bot, text: impl Into<String>) -> Result<(), RequestError> {
        let text = text.into();
        match self {
            MessageTarget::Chat { chat_id, message_id } => {
                bot.edit_message_text(*chat_id, *message_id, text)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            MessageTarget::Inline(id) => {
                bot.edit_message_text_inline(id.clone(), text)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
        }
        Ok(())
    }

    /// Best-effort edit; failures are logged and otherwise ignored.
    pub async fn set_text(&self, bot: &Bot, text: impl Into<String>) {
        if let Err(e) = self.edit_text(bot, text).await {
            if !is_not_modified(&e) {
                log::debug!("Failed to edit status message: {}", e);
            }
        }
    }

    /// Deletes a chat message; inline messages cannot be deleted and are left alone.
    pub async fn delete(&self, bot: &Bot) {
        if let MessageTarget::Chat { chat_id, message_id } = self {
            if let Err(e) = bot.delete_message(*chat_id, *message_id).await {
                log::debug!("Failed to delete status message: {}", e);
            }
        }
    }
}

fn is_not_modified(err: &RequestError) -> bool {
    matches!(err, RequestError::Api(teloxide::ApiError::MessageNotModified))
}

/// Spawns a task that renders `progress` into `target` every `every`.
///
/// The first tick is skipped so short transfers never edit the message. Abort the
/// returned handle once the transfer finishes.
pub fn spawn_ticker(
    bot: Bot,
    target: MessageTarget,
    progress: Progress,
    action: &str,
    name: &str,
    every: Duration,
) -> JoinHandle<()> {
    let action = action.to_string();
    let name = name.to_string();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        let mut last = String::new();
        loop {
            interval.tick().await;
            let state = progress.snapshot();
            let text = if state.downloaded == 0 {
                format!("<b>~ {} ~</b>\n\nStarting...", action)
            } else {
                state.render(&action, &name)
            };
            if text != last {
                target.set_text(&bot, text.clone()).await;
                last = text;
            }
        }
    })
}
