//! Query classification: platform URL, free-text search, or opaque track id.
//!
//! Pure string matching, no I/O. URL patterns are anchored at both ends so chat
//! text that merely contains a link never classifies as a URL, and every pattern is
//! pinned to its own host so no string can match two platforms. The scheme is
//! optional; classified URLs always carry one.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use super::error::ProviderError;
use crate::core::config::limits::{MAX_QUERY_LENGTH, MAX_URL_LENGTH};
use crate::core::utils::truncate_chars;

/// Music platforms the provider can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Spotify,
    YouTube,
    YouTubeMusic,
    SoundCloud,
    AppleMusic,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Spotify,
        Platform::YouTube,
        Platform::YouTubeMusic,
        Platform::SoundCloud,
        Platform::AppleMusic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Spotify => "spotify",
            Platform::YouTube => "youtube",
            Platform::YouTubeMusic => "youtube_music",
            Platform::SoundCloud => "soundcloud",
            Platform::AppleMusic => "apple_music",
        }
    }

    /// Video-site sources that yt-dlp can fetch when the provider fails.
    pub fn is_youtube_class(self) -> bool {
        matches!(self, Platform::YouTube | Platform::YouTubeMusic)
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Platform::Spotify => &SPOTIFY_RE,
            Platform::YouTube => &YOUTUBE_RE,
            Platform::YouTubeMusic => &YOUTUBE_MUSIC_RE,
            Platform::SoundCloud => &SOUNDCLOUD_RE,
            Platform::AppleMusic => &APPLE_MUSIC_RE,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static SPOTIFY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://)?open\.spotify\.com/(track|playlist|album|artist)/[a-zA-Z0-9]+(\?.*)?$")
        .expect("spotify regex")
});

static YOUTUBE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://)?((www|m)\.youtube\.com/(watch\?v=|playlist\?list=|shorts/)|youtube\.com/(watch\?v=|playlist\?list=|shorts/)|youtu\.be/)[a-zA-Z0-9_-]+([?&].*)?$")
        .expect("youtube regex")
});

static YOUTUBE_MUSIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://)?music\.youtube\.com/(watch\?v=|playlist\?list=)[a-zA-Z0-9_-]+([?&].*)?$")
        .expect("youtube music regex")
});

static SOUNDCLOUD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://)?(www\.|m\.)?soundcloud\.com/[a-zA-Z0-9_-]+(/sets)?(/[a-zA-Z0-9_-]+)?/?(\?.*)?$")
        .expect("soundcloud regex")
});

static APPLE_MUSIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://)?(music|geo)\.apple\.com/[a-z]{2}/(album|playlist|song)/[^/?]+/(pl\.[a-zA-Z0-9-]+|[0-9]+)(\?.*)?$")
        .expect("apple music regex")
});

/// Spotify's base-62 track id shape, used for identifiers coming from inline results.
static OPAQUE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]{22}$").expect("id regex"));

/// Any http(s) link inside a text.
pub static ANY_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+").expect("url regex"));

/// Result of classifying user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Url { platform: Platform, url: String },
    Search(String),
    OpaqueId(String),
}

/// Returns the platform whose pattern matches the whole trimmed input.
pub fn match_platform(input: &str) -> Option<Platform> {
    let input = input.trim();
    if input.is_empty() || input.len() > MAX_URL_LENGTH {
        return None;
    }
    Platform::ALL.into_iter().find(|p| p.pattern().is_match(input))
}

/// True if the whole input is a supported platform URL.
pub fn is_supported_url(input: &str) -> bool {
    match_platform(input).is_some()
}

/// Prefixes `https://` when `url` has no scheme.
pub fn with_scheme(url: &str) -> String {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Classifies user input.
///
/// Oversized URLs are rejected; oversized search text is truncated.
pub fn classify(input: &str) -> Result<Query, ProviderError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ProviderError::InvalidInput("empty query".to_string()));
    }

    let looks_like_url = input.starts_with("http://") || input.starts_with("https://");
    if looks_like_url && input.len() > MAX_URL_LENGTH {
        return Err(ProviderError::InvalidInput(format!(
            "URL longer than {} characters",
            MAX_URL_LENGTH
        )));
    }

    if let Some(platform) = match_platform(input) {
        return Ok(Query::Url {
            platform,
            url: with_scheme(input),
        });
    }

    if OPAQUE_ID_RE.is_match(input) {
        return Ok(Query::OpaqueId(input.to_string()));
    }

    Ok(Query::Search(truncate_chars(input, MAX_QUERY_LENGTH).to_string()))
}
