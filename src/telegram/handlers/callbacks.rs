//! Callback query handlers: track buttons and the help menu.

use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, ParseMode};

use super::types::{HandlerDeps, HandlerError};
use crate::core::config;
use crate::download::Progress;
use crate::telegram::delivery::{deliver_audio, AudioMeta};
use crate::telegram::markup::{self, BACK_MENU, HELP_PREFIX};
use crate::telegram::status::{spawn_ticker, MessageTarget};
use crate::telegram::token::{self, TOKEN_PREFIX};

/// Routes a callback by its data prefix.
pub async fn handle_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    let data = q.data.clone().unwrap_or_default();
    log::info!("Callback '{}' from user {}", data, q.from.id);

    if data.starts_with(TOKEN_PREFIX) {
        handle_track_callback(&bot, &q, &deps, &data).await?;
    } else if data == BACK_MENU {
        let text = markup::welcome_text(&q.from.first_name, &deps.bot_name, &deps.bot_username);
        show_menu_page(&bot, &q, text, markup::welcome_keyboard()).await?;
    } else if let Some(platform) = data.strip_prefix(HELP_PREFIX) {
        show_menu_page(&bot, &q, markup::help_text(platform).to_string(), markup::back_keyboard()).await?;
    } else {
        bot.answer_callback_query(q.id.clone()).await?;
    }
    Ok(())
}

async fn show_menu_page(
    bot: &Bot,
    q: &CallbackQuery,
    text: String,
    keyboard: InlineKeyboardMarkup,
) -> Result<(), teloxide::RequestError> {
    bot.answer_callback_query(q.id.clone()).await?;
    if let Some(message) = q.message.as_ref() {
        bot.edit_message_text(message.chat().id, message.id(), text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .await?;
    }
    Ok(())
}

/// Handles a press on a track selection button.
///
/// Malformed payloads get an alert and the keyboard message is deleted; presses by
/// anyone other than the requester get an alert and nothing else happens.
pub async fn handle_track_callback(
    bot: &Bot,
    q: &CallbackQuery,
    deps: &HandlerDeps,
    data: &str,
) -> Result<(), teloxide::RequestError> {
    let token = match token::decode(data) {
        Ok(token) => token,
        Err(e) => {
            log::warn!("Rejected callback '{}': {}", data, e);
            bot.answer_callback_query(q.id.clone())
                .text("❌ Invalid selection.")
                .show_alert(true)
                .await?;
            if let Some(message) = q.message.as_ref() {
                if let Err(e) = bot.delete_message(message.chat().id, message.id()).await {
                    log::debug!("Failed to delete message with malformed keyboard: {}", e);
                }
            }
            return Ok(());
        }
    };

    if !token.allows(q.from.id.0) {
        bot.answer_callback_query(q.id.clone())
            .text("🚫 This button wasn't meant for you")
            .show_alert(true)
            .await?;
        return Ok(());
    }

    // An expired query cannot be answered; the download still goes ahead
    if let Err(e) = bot.answer_callback_query(q.id.clone()).text("⏳ Processing...").await {
        log::warn!("Failed to answer callback query: {}", e);
    }

    let (chat_id, status) = match (q.message.as_ref(), q.inline_message_id.as_ref()) {
        (Some(message), _) => (
            message.chat().id,
            MessageTarget::Chat {
                chat_id: message.chat().id,
                message_id: message.id(),
            },
        ),
        (None, Some(inline_id)) => (ChatId::from(q.from.id), MessageTarget::Inline(inline_id.clone())),
        (None, None) => return Ok(()),
    };

    status.set_text(bot, "🔄 Downloading the song...").await;

    let track = match deps.provider().resolve_track(&token.track_ref).await {
        Ok(track) => track,
        Err(e) => {
            log::warn!("Failed to fetch track {}: {}", token.track_ref, e);
            status.set_text(bot, "❌ Could not fetch track details.").await;
            return Ok(());
        }
    };

    let progress = Progress::new();
    let ticker = spawn_ticker(
        bot.clone(),
        status.clone(),
        progress.clone(),
        "Downloading",
        &track.name,
        config::progress::download_tick(),
    );
    let source_url = token.track_ref.starts_with("http").then_some(token.track_ref.as_str());
    let downloaded = deps.downloader.fetch_track(&track, source_url, &progress).await;
    ticker.abort();

    let result = match downloaded {
        Ok(result) => result,
        Err(e) => {
            log::warn!("Download failed for '{}' [{}]: {}", track.name, e.subcategory(), e);
            status
                .set_text(
                    bot,
                    format!(
                        "⚠️ Failed to download the song.\n<code>{}</code>",
                        teloxide::utils::html::escape(&e.to_string())
                    ),
                )
                .await;
            return Ok(());
        }
    };

    let meta = AudioMeta::from_track(&track);
    match deliver_audio(bot, &deps.config, chat_id, &meta, result, Some(&status)).await {
        Ok(_) => {
            log::debug!("Delivered '{}' to chat {}", track.name, chat_id);
            status.delete(bot).await;
        }
        Err(e) => {
            status
                .set_text(
                    bot,
                    format!(
                        "❌ Failed to send the song.\n<code>{}</code>",
                        teloxide::utils::html::escape(&e.to_string())
                    ),
                )
                .await;
        }
    }
    Ok(())
}
