//! Track resolution against the remote provider, plus the pure query classifier.

pub mod classify;
pub mod client;
pub mod error;
pub mod types;

pub use classify::{classify, is_supported_url, match_platform, Platform, Query};
pub use client::ProviderClient;
pub use error::ProviderError;
pub use types::{SearchResult, SnapResult, SnapVideo, Track, TrackDetail};
