//! Download management: provider files, encrypted streams, yt-dlp and archives

pub mod cdn;
pub mod error;
pub mod fetch;
pub mod media;
pub mod orchestrator;
pub mod playlist;
pub mod probe;
pub mod progress;
pub mod ytdlp;

// Re-exports for convenience
pub use error::DownloadError;
pub use media::{DownloadResult, MediaSource, TempFile};
pub use orchestrator::{parse_internal_link, DirectVideo, Downloader, InternalLink};
pub use playlist::{zip_tracks, ZipResult};
pub use progress::{Progress, ProgressReader, ProgressState};
