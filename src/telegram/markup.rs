//! Captions, keyboards and static texts shown to users.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::html::escape;

use crate::core::config::limits;
use crate::core::utils::ellipsize;
use crate::provider::{Track, TrackDetail};
use crate::telegram::token::{self, TokenError};

/// Channel linked from every delivered track.
pub const BRAND_URL: &str = "https://t.me/FallenProjects";

/// Source repository linked from /start and /privacy.
pub const SOURCE_URL: &str = "https://github.com/AshokShau/SpTubeBot";

const BRAND_LABEL_CHARS: usize = 20;

pub const SELECT_PROMPT: &str = "<b>Select a song from below:</b>";
pub const TOO_MANY_RESULTS: &str = "Too many results. Please use a track URL, or a playlist with fewer than 50 songs.";

/// Platforms with a help page, as `(callback suffix, button label)`.
pub const HELP_PLATFORMS: &[(&str, &str)] = &[
    ("spotify", "🎧 Spotify"),
    ("youtube", "📺 YouTube"),
    ("soundcloud", "☁️ SoundCloud"),
    ("apple", "🍎 Apple Music"),
    ("instagram", "📸 Instagram"),
    ("pinterest", "📌 Pinterest"),
    ("facebook", "📘 Facebook"),
];

pub const HELP_PREFIX: &str = "help_";
pub const BACK_MENU: &str = "back_menu";

/// Caption of a delivered track.
pub fn track_caption(name: &str, year: &str, artist: &str) -> String {
    format!(
        "<b>🎵 {} - {}</b>\n<b>Artist:</b> {}",
        escape(name),
        escape(year),
        escape(artist)
    )
}

pub fn detail_caption(track: &TrackDetail) -> String {
    track_caption(&track.name, &track.year, &track.artist)
}

/// Single URL button labelled with the (shortened) track name.
pub fn branded_keyboard(track_name: &str) -> InlineKeyboardMarkup {
    let label = if track_name.trim().is_empty() {
        "🎧 Fallen Projects".to_string()
    } else {
        ellipsize(track_name, BRAND_LABEL_CHARS)
    };
    InlineKeyboardMarkup::new(vec![vec![url_button(&label, BRAND_URL)]])
}

fn url_button(label: &str, url: &str) -> InlineKeyboardButton {
    match reqwest::Url::parse(url) {
        Ok(parsed) => InlineKeyboardButton::url(label.to_string(), parsed),
        // Only reachable with a malformed constant
        Err(_) => InlineKeyboardButton::callback(label.to_string(), BACK_MENU),
    }
}

/// Keyboard with one button per track, each carrying a callback token.
///
/// `None` when there are more tracks than a keyboard can hold or a token cannot
/// be encoded; callers answer with [`TOO_MANY_RESULTS`].
pub fn selection_keyboard(tracks: &[Track], restrict_to: u64) -> Option<InlineKeyboardMarkup> {
    if tracks.len() > limits::MAX_KEYBOARD_TRACKS {
        log::info!("{} tracks do not fit into a keyboard", tracks.len());
        return None;
    }
    let rows = tracks
        .iter()
        .map(|track| {
            let data = token::encode_track(&track.url, &track.id, restrict_to)?;
            Ok(vec![InlineKeyboardButton::callback(track.label(), data)])
        })
        .collect::<Result<Vec<_>, TokenError>>();
    match rows {
        Ok(rows) => Some(InlineKeyboardMarkup::new(rows)),
        Err(e) => {
            log::warn!("Could not build selection keyboard: {}", e);
            None
        }
    }
}

pub fn welcome_text(first_name: &str, bot_name: &str, bot_username: &str) -> String {
    format!(
        "👋 Hello <b>{}</b>!\n\n\
         🎧 <b>Welcome to {}</b>, your personal music downloader bot!\n\
         Supports: <b>Spotify</b>, <b>YouTube</b>, <b>Apple Music</b>, and <b>SoundCloud</b>.\n\n\
         🔍 <b>To search:</b> Send a song name or a link.\n\
         💬 <b>Inline Search:</b> <code>@{} lofi mood</code>\n\
         📥 <b>Group Command:</b> <code>/spotify &lt;url&gt;</code>\n\
         🎬 <b>Videos:</b> <code>/vid &lt;url&gt;</code>\n\n\
         🔗 Source Code: <a href=\"{}\">GitHub Repo</a>\n\
         📜 /privacy for the privacy policy",
        escape(first_name),
        escape(bot_name),
        escape(bot_username),
        SOURCE_URL
    )
}

/// Help buttons laid out two per row.
pub fn welcome_keyboard() -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = HELP_PLATFORMS
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|(key, label)| InlineKeyboardButton::callback(label.to_string(), format!("{}{}", HELP_PREFIX, key)))
                .collect()
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

pub fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback("⬅️ Back", BACK_MENU)]])
}

pub fn help_text(platform: &str) -> &'static str {
    match platform {
        "spotify" => {
            "💡<b>Spotify Downloader</b>\n\n\
             🔹 Download songs, albums, and playlists\n\n\
             Example formats:\n\
             👉 <code>https://open.spotify.com/track/*</code> (Single song)\n\
             👉 <code>https://open.spotify.com/album/*</code> (Full album)\n\
             👉 <code>https://open.spotify.com/playlist/*</code> (Playlist)\n\
             👉 <code>https://open.spotify.com/artist/*</code> (Artist's top tracks)"
        }
        "youtube" => {
            "💡<b>YouTube Downloader</b>\n\n\
             🔹 Download videos with /vid or extract audio\n\
             🔹 Supports both YouTube and YouTube Music links\n\n\
             Example formats:\n\
             👉 <code>https://youtu.be/*</code> (Short URL)\n\
             👉 <code>https://www.youtube.com/watch?v=*</code> (Full URL)\n\
             👉 <code>https://music.youtube.com/watch?v=*</code> (YouTube Music)"
        }
        "soundcloud" => {
            "💡<b>SoundCloud Downloader</b>\n\n\
             Example formats:\n\
             👉 <code>https://soundcloud.com/user/track-name</code>\n\
             👉 <code>https://soundcloud.com/user/track-name?utm_source=*</code>"
        }
        "apple" => {
            "💡<b>Apple Music Downloader</b>\n\n\
             🔹 Supports songs, albums, and artists\n\n\
             Example formats:\n\
             👉 <code>https://music.apple.com/us/song/*</code>\n\
             👉 <code>https://music.apple.com/us/album/*</code>\n\
             👉 <code>https://music.apple.com/us/artist/*</code>"
        }
        "instagram" => {
            "💡<b>Instagram Media Downloader</b>\n\n\
             Download Reels, Stories, and Posts:\n\n\
             👉 <code>https://www.instagram.com/p/*</code>\n\
             👉 <code>https://www.instagram.com/reel/Cxyz123/</code>\n\
             👉 <code>https://www.instagram.com/stories/*</code>"
        }
        "pinterest" => {
            "💡<b>Pinterest Downloader</b>\n\n\
             Photos and videos are available to download:\n\n\
             👉 <code>https://www.pinterest.com/pin/1085649053904273177/</code>\n\
             👉 <code>https://pin.it/*</code>"
        }
        "facebook" => {
            "💡<b>Facebook Downloader</b>\n\n\
             Works with videos from public pages:\n\n\
             👉 <code>https://fb.watch/*</code>\n\
             👉 <code>https://www.facebook.com/page/videos/123456789</code>"
        }
        _ => "<b>No help available for this platform.</b>",
    }
}

pub fn privacy_text(bot_name: &str) -> String {
    let name = escape(bot_name);
    format!(
        "🔒 <b>Privacy Policy for {name}</b>\n\n\
         <b>1. Data Collection and Storage</b>\n\
         {name} does <b>not collect, store, or share</b> any user data. Messages, usernames, \
         ids and song requests are not logged, and nothing is kept on the server once a \
         request is completed.\n\n\
         <b>2. Third-Party Services</b>\n\
         Tracks are fetched from platforms such as <b>YouTube</b> and <b>Spotify</b>, which \
         have their own privacy policies.\n\n\
         <b>3. Open Source</b>\n\
         You can review, audit, or contribute: <a href=\"{source}\">{source}</a>\n\n\
         <b>4. Contact</b>\n\
         <a href=\"{brand}\">@FallenProjects</a>",
        name = name,
        source = SOURCE_URL,
        brand = BRAND_URL
    )
}
