//! Command handler implementations (/start, /ping, /privacy, /vid, /playlist)

use std::time::Instant;

use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters};

use super::messages::{handle_track_query, lookup, reply_html};
use super::snap::handle_snap;
use super::types::{report_error, sender_id, HandlerDeps, HandlerError};
use crate::core::config;
use crate::core::error::AppResult;
use crate::core::utils::format_clock;
use crate::download::{zip_tracks, DirectVideo, DownloadResult, Progress};
use crate::telegram::bot::Command;
use crate::telegram::delivery::{deliver_document, deliver_video};
use crate::telegram::filters::find_snap_link;
use crate::telegram::markup;
use crate::telegram::status::{spawn_ticker, MessageTarget};

/// Dispatches a parsed public command. Owner commands are routed separately.
pub(super) async fn handle_command(bot: &Bot, msg: &Message, deps: &HandlerDeps, cmd: Command) -> Result<(), HandlerError> {
    log::info!("Received command: {:?} from chat {}", cmd, msg.chat.id);

    let result = match cmd {
        Command::Start | Command::Help => handle_start_command(bot, msg, deps).await,
        Command::Ping => handle_ping_command(bot, msg, deps).await,
        Command::Privacy => handle_privacy_command(bot, msg, deps).await,
        Command::Spotify(query) => handle_track_query(bot, msg, deps, &query).await,
        Command::Vid(url) | Command::Yt(url) => handle_vid_command(bot, msg, deps, &url).await,
        Command::Playlist(query) => handle_playlist_command(bot, msg, deps, &query).await,
        Command::Insta(url) => handle_insta_command(bot, msg, deps, &url).await,
        Command::Dl | Command::Ul(_) | Command::Restart => Ok(()),
    };

    if let Err(e) = result {
        report_error(bot, msg, "Command", &e).await;
    }
    Ok(())
}

/// Handle /start and /help
pub(super) async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let first_name = msg.from.as_ref().map(|u| u.first_name.as_str()).unwrap_or("there");
    bot.send_message(msg.chat.id, markup::welcome_text(first_name, &deps.bot_name, &deps.bot_username))
        .parse_mode(ParseMode::Html)
        .reply_markup(markup::welcome_keyboard())
        .await?;
    Ok(())
}

/// Handle /ping: round-trip latency of one send plus process uptime
pub(super) async fn handle_ping_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let start = Instant::now();
    let reply = reply_html(bot, msg, "🏓 Pinging...").await?;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

    let text = format!(
        "📊 <b>System Performance Metrics</b>\n\n\
         ⏱️ <b>Bot Latency:</b> <code>{:.2} ms</code>\n\
         🕒 <b>Uptime:</b> <code>{}</code>\n\
         📅 <b>Started:</b> <code>{}</code>\n\
         🤖 <b>Bot Version:</b> <code>{}</code>",
        latency_ms,
        format_clock(deps.started_at.elapsed().as_secs()),
        deps.started_on.format("%Y-%m-%d %H:%M UTC"),
        env!("CARGO_PKG_VERSION")
    );
    MessageTarget::of(&reply).edit_text(bot, text).await?;
    Ok(())
}

pub(super) async fn handle_privacy_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    bot.send_message(msg.chat.id, markup::privacy_text(&deps.bot_name))
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

/// Handle /insta: like a passive snap link, but the argument is used as given
pub(super) async fn handle_insta_command(bot: &Bot, msg: &Message, deps: &HandlerDeps, url: &str) -> AppResult<()> {
    let url = url.trim();
    if url.is_empty() {
        reply_html(bot, msg, "❗ Please provide an Instagram, Pinterest or Facebook link.").await?;
        return Ok(());
    }
    handle_snap(bot, msg, deps, find_snap_link(url).unwrap_or(url)).await
}

/// Handle /vid: provider direct link first, yt-dlp second; the status message narrates
/// which path is taken.
pub(super) async fn handle_vid_command(bot: &Bot, msg: &Message, deps: &HandlerDeps, url: &str) -> AppResult<()> {
    let url = url.trim();
    if url.is_empty() {
        reply_html(bot, msg, "❗ Provide a video URL.").await?;
        return Ok(());
    }

    let status_msg = reply_html(bot, msg, "Trying direct download from API...").await?;
    let status = MessageTarget::of(&status_msg);
    let progress = Progress::new();
    let ticker = spawn_ticker(
        bot.clone(),
        status.clone(),
        progress.clone(),
        "Downloading",
        url,
        config::progress::download_tick(),
    );

    let downloaded = match deps.downloader.direct_video(url, &progress).await {
        DirectVideo::Downloaded(result) => Ok(result),
        miss => {
            log::info!("/vid {}: {}", url, miss.fallback_notice());
            status.set_text(bot, miss.fallback_notice()).await;
            deps.downloader.ytdlp_video(url, &progress).await
        }
    };
    ticker.abort();

    let result = match downloaded {
        Ok(result) => result,
        Err(e) => {
            log::warn!("/vid failed for {}: {}", url, e);
            status.set_text(bot, "<code>video not found.</code>").await;
            return Ok(());
        }
    };

    match deliver_video(bot, msg.chat.id, result, None, Some(&status), url).await {
        Ok(_) => status.delete(bot).await,
        Err(e) => {
            status.set_text(bot, format!("❌ Error: {}", teloxide::utils::html::escape(&e.to_string()))).await;
            log::error!("/vid upload failed: {}", e);
        }
    }
    Ok(())
}

/// Handle /playlist: download up to a handful of tracks and send them as one ZIP
pub(super) async fn handle_playlist_command(bot: &Bot, msg: &Message, deps: &HandlerDeps, query: &str) -> AppResult<()> {
    let query = query.trim();
    if query.is_empty() {
        reply_html(
            bot,
            msg,
            "🎵 Please send me a song name, artist, or Spotify URL.\nExample: <code>/playlist Daft Punk Get Lucky</code>",
        )
        .await?;
        return Ok(());
    }

    let status_msg = reply_html(bot, msg, "🔍 Searching for tracks...").await?;
    let status = MessageTarget::of(&status_msg);

    let tracks = match lookup(deps, query, sender_id(msg)).await {
        Ok((tracks, _)) => tracks,
        Err(e) => {
            log::warn!("Playlist lookup failed for '{}' (user {}): {}", query, sender_id(msg), e);
            status.set_text(bot, "⚠️ Couldn't find any tracks. Please try a different search.").await;
            return Ok(());
        }
    };

    let total = tracks.len();
    status
        .set_text(bot, format!("⏳ Found {} tracks. Preparing download...", total))
        .await;

    let zip = match zip_tracks(&deps.downloader, &tracks.results).await {
        Ok(zip) => zip,
        Err(e) => {
            log::error!("Zip creation failed: {}", e);
            status.set_text(bot, "❌ Failed to create zip file. Please try again later.").await;
            return Ok(());
        }
    };

    let mut summary = format!("✅ Success! Downloaded {}/{} tracks.", zip.success_count, total);
    if !zip.errors.is_empty() {
        summary.push_str(&format!("\n\n⚠️ {} tracks failed to download.", zip.errors.len()));
    }
    status.set_text(bot, summary).await;

    let caption = format!("🎵 {} tracks", zip.success_count);
    let result = DownloadResult::local(zip.archive, None);
    deliver_document(bot, msg.chat.id, result, Some(&caption), None, "playlist")
        .await
        .inspect_err(|e| log::error!("Failed to send zip file: {}", e))?;
    Ok(())
}
