//! Inline mode: search results as articles, and the audio swap once one is chosen.

use teloxide::prelude::*;
use teloxide::types::{
    ChatId, ChosenInlineResult, InlineKeyboardButton, InlineKeyboardMarkup, InlineQuery, InlineQueryResult,
    InlineQueryResultArticle, InputMessageContent, InputMessageContentText, ParseMode,
};
use teloxide::utils::html::escape;

use super::types::{HandlerDeps, HandlerError};
use crate::core::config::{self, limits};
use crate::download::Progress;
use crate::provider::Track;
use crate::telegram::delivery::{deliver_inline_audio, AudioMeta};
use crate::telegram::status::{spawn_ticker, MessageTarget};

fn text_article(id: &str, title: &str, description: &str, text: &str) -> InlineQueryResult {
    InlineQueryResult::Article(
        InlineQueryResultArticle::new(
            id,
            title,
            InputMessageContent::Text(InputMessageContentText::new(text)),
        )
        .description(description),
    )
}

/// Article for one search hit. The result id is the provider track id, which is
/// what [`handle_chosen_inline_result`] resolves.
pub fn track_article(track: &Track) -> InlineQueryResult {
    let text = format!(
        "<b>🎧 Track</b>\n\n<b>Name:</b> {}\n<b>Artist:</b> {}\n<b>Year:</b> {}\n\n<b>ID:</b> <code>{}</code>",
        escape(&track.name),
        escape(&track.artist),
        escape(&track.year),
        escape(&track.id)
    );
    // The keyboard is required: without it Telegram sends no inline message id back
    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::switch_inline_query_current_chat(
        "🔁 Search Again",
        track.artist.clone(),
    )]]);

    let mut article = InlineQueryResultArticle::new(
        track.id.clone(),
        track.label(),
        InputMessageContent::Text(InputMessageContentText::new(text).parse_mode(ParseMode::Html)),
    )
    .description(track.year.clone())
    .reply_markup(keyboard);
    if let Ok(thumb) = reqwest::Url::parse(&track.cover_small) {
        article = article.thumbnail_url(thumb);
    }
    InlineQueryResult::Article(article)
}

/// Builds the answer for an inline query text.
pub async fn inline_results(deps: &HandlerDeps, query: &str) -> Vec<InlineQueryResult> {
    let query = query.trim();
    if query.is_empty() {
        return vec![text_article(
            "no_query",
            "❗️ No Query",
            "Please type something to search 🎵",
            "❗️ No query entered.",
        )];
    }

    match deps.provider().search(query, Some(limits::INLINE_SEARCH_LIMIT)).await {
        Ok(found) => found.results.iter().map(track_article).collect(),
        Err(e) => {
            log::warn!("Inline search for '{}' failed: {}", query, e);
            vec![text_article("error", "⚠️ Error", "Failed to search.", "❌ Failed to search.")]
        }
    }
}

pub async fn handle_inline_query(bot: Bot, q: InlineQuery, deps: HandlerDeps) -> Result<(), HandlerError> {
    log::info!("Inline query '{}' from user {}", q.query, q.from.id);
    let results = inline_results(&deps, &q.query).await;
    if let Err(e) = bot.answer_inline_query(q.id.clone(), results).await {
        log::error!("Failed to answer inline query: {}", e);
    }
    Ok(())
}

/// Downloads the chosen track and turns the placeholder article into the audio.
pub async fn handle_chosen_inline_result(
    bot: Bot,
    chosen: ChosenInlineResult,
    deps: HandlerDeps,
) -> Result<(), HandlerError> {
    let Some(inline_id) = chosen.inline_message_id.clone() else {
        log::warn!("Chosen inline result {} has no inline message id", chosen.result_id);
        return Ok(());
    };
    log::info!("Inline result {} chosen by user {}", chosen.result_id, chosen.from.id);
    let target = MessageTarget::Inline(inline_id.clone());

    let track = match deps.provider().resolve_track(&chosen.result_id).await {
        Ok(track) => track,
        Err(e) => {
            log::warn!("Inline track {} not found: {}", chosen.result_id, e);
            target.set_text(&bot, "❌ Song not found.").await;
            return Ok(());
        }
    };

    target.set_text(&bot, "🔄 Downloading the song...").await;
    let progress = Progress::new();
    let ticker = spawn_ticker(
        bot.clone(),
        target.clone(),
        progress.clone(),
        "Downloading",
        &track.name,
        config::progress::download_tick(),
    );
    let downloaded = deps.downloader.fetch_track(&track, None, &progress).await;
    ticker.abort();

    let result = match downloaded {
        Ok(result) => result,
        Err(e) => {
            log::warn!("Inline download of '{}' failed: {}", track.name, e);
            target.set_text(&bot, "⚠️ Failed to download the song.").await;
            return Ok(());
        }
    };

    let meta = AudioMeta::from_track(&track);
    let user_chat = ChatId::from(chosen.from.id);
    if let Err(e) = deliver_inline_audio(&bot, &deps.config, &inline_id, user_chat, &meta, result).await {
        log::error!("Inline delivery of '{}' failed: {}", track.name, e);
        target
            .set_text(&bot, format!("❌ Failed to send the song.\n<code>{}</code>", escape(&e.to_string())))
            .await;
    }
    Ok(())
}
