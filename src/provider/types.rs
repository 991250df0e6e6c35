//! Data shapes returned by the provider API.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One entry of a search or URL-resolution result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub year: String,
    /// Seconds
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub cover_small: String,
    #[serde(default)]
    pub platform: String,
}

impl Track {
    /// Button label used in selection keyboards.
    pub fn label(&self) -> String {
        if self.artist.is_empty() {
            self.name.clone()
        } else {
            format!("{} - {}", self.name, self.artist)
        }
    }
}

/// Ordered result set for one interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub results: Vec<Track>,
}

impl SearchResult {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Full track description with download coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDetail {
    /// Direct file URL, encrypted stream URL, or an internal `t.me` link
    #[serde(default)]
    pub cdnurl: String,
    /// Hex AES key for encrypted streams; empty for direct files
    #[serde(default)]
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub artist: String,
    /// Provider track code, stable per track
    #[serde(default)]
    pub tc: String,
    #[serde(default)]
    pub cover: String,
    #[serde(default)]
    pub lyrics: String,
    #[serde(default)]
    pub album: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub year: String,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub platform: String,
}

impl TrackDetail {
    /// Stem for local file names; falls back to the track name when `tc` is empty.
    pub fn file_stem(&self) -> &str {
        if self.tc.is_empty() {
            &self.name
        } else {
            &self.tc
        }
    }

    /// Platforms whose `cdnurl` points at a plain media file.
    pub fn is_direct_download(&self) -> bool {
        matches!(self.platform.as_str(), "youtube" | "soundcloud") || self.key.is_empty()
    }
}

/// One video of a snap result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapVideo {
    #[serde(default)]
    pub video: String,
    #[serde(default)]
    pub thumbnail: String,
}

/// Media extracted from a social post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapResult {
    #[serde(default)]
    pub video: Vec<SnapVideo>,
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub fetch: bool,
}

impl SnapResult {
    pub fn video_urls(&self) -> Vec<String> {
        self.video
            .iter()
            .filter(|v| !v.video.is_empty())
            .map(|v| v.video.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty() && self.video_urls().is_empty()
    }
}

/// Response of the direct video link endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct VideoLink {
    #[serde(default)]
    pub results: String,
}

/// Years arrive as strings from search and as integers from track detail.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}
