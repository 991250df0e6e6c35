//! Track lookup shared by passive messages and `/spotify`.

use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters};

use super::snap::handle_snap;
use super::types::{report_error, sender_id, HandlerDeps};
use crate::core::config::limits;
use crate::core::error::{AppError, AppResult};
use crate::provider::{classify, Query, SearchResult};
use crate::telegram::filters::{find_snap_link, MessageRoute};
use crate::telegram::markup::{selection_keyboard, SELECT_PROMPT, TOO_MANY_RESULTS};
use crate::telegram::token::UNRESTRICTED;

/// Entry point for non-command messages that passed the route table.
pub async fn handle_passive(bot: &Bot, msg: &Message, deps: &HandlerDeps, route: MessageRoute) {
    let text = msg.text().unwrap_or_default().trim();
    log::info!("Passive {:?} message in chat {}", route, msg.chat.id);

    let result = match route {
        MessageRoute::Track => handle_track_query(bot, msg, deps, text).await,
        MessageRoute::Snap => match find_snap_link(text) {
            Some(link) => handle_snap(bot, msg, deps, link).await,
            None => Ok(()),
        },
    };
    if let Err(e) = result {
        report_error(bot, msg, "Passive message", &e).await;
    }
}

/// Resolves `query` and answers with a selection keyboard.
///
/// Platform URLs produce unrestricted buttons (anyone in the chat may pick); search
/// results are restricted to the sender.
pub async fn handle_track_query(bot: &Bot, msg: &Message, deps: &HandlerDeps, query: &str) -> AppResult<()> {
    if query.trim().is_empty() {
        reply_html(bot, msg, "❗ Please provide a song name or a supported link.").await?;
        return Ok(());
    }

    let (tracks, restrict_to) = lookup(deps, query, sender_id(msg)).await?;
    log::info!("{} tracks for '{}' in chat {}", tracks.len(), query, msg.chat.id);

    let Some(keyboard) = selection_keyboard(&tracks.results, restrict_to) else {
        reply_html(bot, msg, TOO_MANY_RESULTS).await?;
        return Ok(());
    };

    let sent = bot
        .send_message(msg.chat.id, SELECT_PROMPT)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .reply_markup(keyboard)
        .await;
    if let Err(e) = sent {
        // Oversized keyboards are rejected by Telegram itself
        log::error!("Failed to send selection keyboard: {}", e);
        reply_html(bot, msg, TOO_MANY_RESULTS).await?;
    }
    Ok(())
}

/// Runs the provider call matching the query kind.
pub async fn lookup(deps: &HandlerDeps, query: &str, sender: u64) -> AppResult<(SearchResult, u64)> {
    let provider = deps.provider();
    match classify(query)? {
        Query::Url { url, .. } => Ok((provider.resolve_url(&url).await?, UNRESTRICTED)),
        Query::Search(text) | Query::OpaqueId(text) => {
            Ok((provider.search(&text, Some(limits::CHAT_SEARCH_LIMIT)).await?, sender))
        }
    }
}

pub(super) async fn reply_html(bot: &Bot, msg: &Message, text: impl Into<String>) -> AppResult<Message> {
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await
        .map_err(AppError::from)
}
