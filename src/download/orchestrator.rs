//! Turns a resolved track (or a video URL) into something deliverable.
//!
//! Per attempt the flow is remote first, local tool second:
//!
//! ```text
//! Init -> RemoteDownload -> Success
//!                        -> YtDlpFallback (YouTube-class sources only) -> Success | Failed
//! ```
//!
//! Every temp file created on the way is owned by a [`TempFile`] guard, so a
//! terminal failure never leaves anything behind in the downloads directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use super::cdn;
use super::error::DownloadError;
use super::fetch::{download_to_file, fetch_bytes, fetch_cover};
use super::media::{DownloadResult, TempFile};
use super::progress::Progress;
use super::ytdlp::{self, Profile};
use crate::core::config::{limits, network, Config};
use crate::core::utils::unique_path;
use crate::provider::{match_platform, ProviderClient, TrackDetail};

static INTERNAL_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://t\.me/([^/\s]+)/(\d+)/?$").expect("internal link regex"));

/// A message inside the chat platform that already holds the media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalLink {
    pub channel: String,
    pub message_id: i32,
}

/// Parses `https://t.me/<channel>/<message>`.
pub fn parse_internal_link(url: &str) -> Option<InternalLink> {
    let caps = INTERNAL_LINK_RE.captures(url.trim())?;
    let message_id = caps.get(2)?.as_str().parse().ok()?;
    Some(InternalLink {
        channel: caps.get(1)?.as_str().to_string(),
        message_id,
    })
}

/// Download orchestrator shared by every handler.
#[derive(Clone, Debug)]
pub struct Downloader {
    config: Arc<Config>,
    provider: ProviderClient,
    /// Unauthenticated client for covers, CDN files and direct links.
    /// No total timeout: long transfers only fail when the host goes quiet.
    http: reqwest::Client,
}

impl Downloader {
    pub fn new(config: Arc<Config>, provider: ProviderClient) -> Result<Self, DownloadError> {
        let http = reqwest::Client::builder()
            .connect_timeout(network::media_connect_timeout())
            .read_timeout(network::media_read_timeout())
            .build()?;
        Ok(Self { config, provider, http })
    }

    pub fn provider(&self) -> &ProviderClient {
        &self.provider
    }

    pub fn download_dir(&self) -> &Path {
        &self.config.download_path
    }

    /// Fetches the audio for `track`.
    ///
    /// `source_url` is the platform URL the user picked, if any; it decides whether
    /// yt-dlp may be used when the provider's file cannot be obtained.
    pub async fn fetch_track(
        &self,
        track: &TrackDetail,
        source_url: Option<&str>,
        progress: &Progress,
    ) -> Result<DownloadResult, DownloadError> {
        let thumbnail = fetch_cover(&self.http, &track.cover, limits::MAX_COVER_BYTES).await;

        if parse_internal_link(&track.cdnurl).is_some() {
            log::info!("Track {} is already uploaded at {}", track.name, track.cdnurl);
            return Ok(DownloadResult::remote(track.cdnurl.trim(), thumbnail));
        }

        let remote_err = match self.remote_track(track, progress).await {
            Ok(file) => return Ok(DownloadResult::local(file, thumbnail)),
            Err(e) => e,
        };
        log::warn!(
            "Remote download of '{}' failed [{}]: {}",
            track.name,
            remote_err.subcategory(),
            remote_err
        );

        let Some(url) = source_url.filter(|u| is_youtube_class(u)) else {
            return Err(DownloadError::Failed(remote_err.to_string()));
        };
        log::info!("Falling back to yt-dlp audio for {}", url);
        let file = self
            .ytdlp(Profile::Audio, url, track.file_stem(), progress)
            .await
            .map_err(|e| DownloadError::Failed(format!("{}; fallback: {}", remote_err, e)))?;
        Ok(DownloadResult::local(file, thumbnail))
    }

    async fn remote_track(&self, track: &TrackDetail, progress: &Progress) -> Result<TempFile, DownloadError> {
        if track.cdnurl.trim().is_empty() {
            return Err(DownloadError::Failed("missing CDN URL".to_string()));
        }
        self.ensure_dir().await?;

        if track.is_direct_download() {
            let ext = url_extension(&track.cdnurl).unwrap_or("mp3");
            let file = TempFile::new(unique_path(self.download_dir(), track.file_stem(), ext));
            download_to_file(&self.http, &track.cdnurl, file.path(), progress).await?;
            return Ok(file);
        }

        let encrypted = TempFile::new(unique_path(self.download_dir(), track.file_stem(), "enc"));
        let decrypted = TempFile::new(unique_path(self.download_dir(), track.file_stem(), "tmp.ogg"));
        let output = TempFile::new(unique_path(self.download_dir(), track.file_stem(), "ogg"));

        download_to_file(&self.http, &track.cdnurl, encrypted.path(), progress).await?;
        cdn::decrypt_file(encrypted.path(), decrypted.path(), &track.key).await?;
        cdn::remux(&self.config.ffmpeg_bin, decrypted.path(), output.path(), track).await?;
        Ok(output)
    }

    /// Fetches a video for `/vid`: the provider's direct link first, yt-dlp otherwise.
    pub async fn fetch_video(&self, url: &str, progress: &Progress) -> Result<DownloadResult, DownloadError> {
        match self.direct_video(url, progress).await {
            DirectVideo::Downloaded(result) => Ok(result),
            miss => {
                log::info!("{}", miss.fallback_notice());
                self.ytdlp_video(url, progress).await
            }
        }
    }

    /// Tries the provider's direct video link only.
    pub async fn direct_video(&self, url: &str, progress: &Progress) -> DirectVideo {
        let link = match self.provider.video_link(url).await {
            Ok(Some(link)) => link,
            Ok(None) => return DirectVideo::NoLink,
            Err(e) => {
                log::warn!("Video link lookup failed for {}: {}", url, e);
                return DirectVideo::Unreachable;
            }
        };
        match self.fetch_url(&link, "video", "mp4", progress).await {
            Ok(result) => DirectVideo::Downloaded(result),
            Err(e) => {
                log::warn!("Direct video download failed for {}: {}", url, e);
                DirectVideo::DownloadFailed
            }
        }
    }

    /// Downloads a video with yt-dlp (720p cap, merged into mp4).
    pub async fn ytdlp_video(&self, url: &str, progress: &Progress) -> Result<DownloadResult, DownloadError> {
        let file = self
            .ytdlp(Profile::Video, url, "video", progress)
            .await
            .map_err(|e| DownloadError::Failed(e.to_string()))?;
        Ok(DownloadResult::local(file, None))
    }

    /// Downloads any URL to a fresh temp file.
    pub async fn fetch_url(
        &self,
        url: &str,
        stem: &str,
        extension: &str,
        progress: &Progress,
    ) -> Result<DownloadResult, DownloadError> {
        self.ensure_dir().await?;
        let ext = url_extension(url).unwrap_or(extension);
        let file = TempFile::new(unique_path(self.download_dir(), stem, ext));
        download_to_file(&self.http, url, file.path(), progress).await?;
        Ok(DownloadResult::local(file, None))
    }

    /// Fetches a post image into memory so it can be uploaded without a temp file.
    pub async fn fetch_image(&self, url: &str, stem: &str) -> Result<DownloadResult, DownloadError> {
        let data = fetch_bytes(&self.http, url, limits::MAX_PHOTO_BYTES).await?;
        let ext = url_extension(url).unwrap_or("jpg");
        Ok(DownloadResult::bytes(format!("{}.{}", stem, ext), data))
    }

    async fn ytdlp(&self, profile: Profile, url: &str, stem: &str, progress: &Progress) -> Result<TempFile, DownloadError> {
        self.ensure_dir().await?;
        let file = TempFile::new(unique_path(self.download_dir(), stem, profile.extension()));
        ytdlp::run(
            &self.config.ytdl_bin,
            profile,
            url,
            file.path(),
            self.config.proxy.as_deref(),
            progress,
        )
        .await?;
        Ok(file)
    }

    async fn ensure_dir(&self) -> Result<(), DownloadError> {
        fs_err::tokio::create_dir_all(self.download_dir()).await?;
        Ok(())
    }
}

fn is_youtube_class(url: &str) -> bool {
    match_platform(url).is_some_and(|p| p.is_youtube_class())
}

/// Short alphanumeric extension of the URL path, if any.
fn url_extension(raw: &str) -> Option<&str> {
    let path = raw.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())).then_some(ext)
}

/// Outcome of the direct-link attempt for a video.
#[derive(Debug)]
pub enum DirectVideo {
    Downloaded(DownloadResult),
    NoLink,
    Unreachable,
    DownloadFailed,
}

impl DirectVideo {
    /// Status line shown when yt-dlp takes over.
    pub fn fallback_notice(&self) -> &'static str {
        match self {
            DirectVideo::Downloaded(_) => "Downloaded from API.",
            DirectVideo::NoLink => "No direct download found. Using yt-dlp...",
            DirectVideo::Unreachable => "API unreachable. Using yt-dlp...",
            DirectVideo::DownloadFailed => "API download failed, falling back to yt-dlp...",
        }
    }
}

/// Where a finished file should be placed when the user asked for it explicitly.
pub fn owner_download_path(dir: &Path, file_name: &str) -> PathBuf {
    dir.join(crate::core::utils::escape_filename(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(dir: &Path, api_url: &str) -> Arc<Config> {
        config_with_ytdl(dir, api_url, "/nonexistent/yt-dlp")
    }

    fn config_with_ytdl(dir: &Path, api_url: &str, ytdl_bin: &str) -> Arc<Config> {
        let dir = dir.to_string_lossy().into_owned();
        let api_url = api_url.to_string();
        let ytdl_bin = ytdl_bin.to_string();
        let lookup = move |key: &str| match key {
            "TOKEN" => Some("1:x".to_string()),
            "API_KEY" => Some("k".to_string()),
            "API_URL" => Some(api_url.clone()),
            "DOWNLOAD_PATH" => Some(dir.clone()),
            "YTDL_BIN" => Some(ytdl_bin.clone()),
            _ => None,
        };
        Arc::new(Config::from_lookup(lookup).unwrap())
    }

    fn downloader(dir: &Path, api_url: &str) -> Downloader {
        downloader_from(config(dir, api_url))
    }

    fn downloader_from(config: Arc<Config>) -> Downloader {
        let provider = ProviderClient::from_config(&config).unwrap();
        Downloader::new(config, provider).unwrap()
    }

    /// A stand-in yt-dlp that prints one progress line and writes its `-o` target.
    #[cfg(unix)]
    fn stub_ytdlp(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("yt-dlp");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             while [ $# -gt 0 ]; do\n\
               if [ \"$1\" = \"-o\" ]; then out=\"$2\"; fi\n\
               shift\n\
             done\n\
             echo \"[download]  50.0% of 1.00KiB at 1.00KiB/s ETA 00:01\"\n\
             echo \"some warning\" >&2\n\
             printf 'ID3fallback' > \"$out\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    fn detail(json: serde_json::Value) -> TrackDetail {
        serde_json::from_value(json).unwrap()
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(true)
    }

    #[test]
    fn test_parse_internal_link() {
        assert_eq!(
            parse_internal_link("https://t.me/songs_dump/1234"),
            Some(InternalLink {
                channel: "songs_dump".into(),
                message_id: 1234
            })
        );
        assert!(parse_internal_link("https://t.me/songs_dump").is_none());
        assert!(parse_internal_link("https://cdn.example.com/t.me/a/1").is_none());
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("https://cdn/x/song.m4a?sig=1"), Some("m4a"));
        assert_eq!(url_extension("https://cdn/x/stream"), None);
        assert_eq!(url_extension("https://cdn/x/a.b/c"), None);
    }

    #[tokio::test]
    async fn test_internal_link_is_followed_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        let dl = downloader(dir.path(), &server.uri());
        let track = detail(serde_json::json!({"cdnurl": "https://t.me/dump_chan/77", "name": "Song"}));

        let result = dl.fetch_track(&track, None, &Progress::new()).await.unwrap();
        assert_eq!(result.media, crate::download::MediaSource::RemoteRef("https://t.me/dump_chan/77".into()));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_direct_download_for_youtube_platform() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/song.m4a"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![3u8; 1000]))
            .mount(&server)
            .await;
        let dl = downloader(dir.path(), &server.uri());
        let track = detail(serde_json::json!({
            "cdnurl": format!("{}/files/song.m4a", server.uri()),
            "name": "Song",
            "tc": "yt123",
            "platform": "youtube"
        }));

        let result = dl.fetch_track(&track, None, &Progress::new()).await.unwrap();
        let path = result.media.local_path().unwrap().to_path_buf();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("m4a"));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 1000);
        drop(result);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failure_without_fallback_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let dl = downloader(dir.path(), &server.uri());
        let track = detail(serde_json::json!({
            "cdnurl": format!("{}/enc", server.uri()),
            "key": "000102030405060708090a0b0c0d0e0f",
            "name": "Song",
            "platform": "spotify"
        }));

        let err = dl
            .fetch_track(&track, Some("https://open.spotify.com/track/abc"), &Progress::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Failed(_)));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_youtube_fallback_failure_is_download_failed() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        let dl = downloader(dir.path(), &server.uri());
        let track = detail(serde_json::json!({"cdnurl": "", "name": "Song", "platform": "youtube"}));

        let err = dl
            .fetch_track(&track, Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), &Progress::new())
            .await
            .unwrap_err();
        match err {
            DownloadError::Failed(reason) => assert!(reason.contains("fallback")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_direct_video_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/yt"))
            .and(wiremock::matchers::query_param("id", "https://youtu.be/none"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": ""})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/yt"))
            .and(wiremock::matchers::query_param("id", "https://youtu.be/some"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"results": format!("{}/files/v.mp4", server.uri())})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8; 64]))
            .mount(&server)
            .await;
        let dl = downloader(dir.path(), &server.uri());

        let miss = dl.direct_video("https://youtu.be/none", &Progress::new()).await;
        assert!(matches!(miss, DirectVideo::NoLink));
        assert_eq!(miss.fallback_notice(), "No direct download found. Using yt-dlp...");

        match dl.direct_video("https://youtu.be/some", &Progress::new()).await {
            DirectVideo::Downloaded(result) => {
                let path = result.media.local_path().unwrap().to_path_buf();
                assert_eq!(std::fs::metadata(&path).unwrap().len(), 64);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(dir_is_empty(dir.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_youtube_fallback_success_is_cleaned_up_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let bin_dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let script = stub_ytdlp(bin_dir.path());
        let dl = downloader_from(config_with_ytdl(dir.path(), &server.uri(), &script.to_string_lossy()));
        let track = detail(serde_json::json!({
            "cdnurl": format!("{}/files/song.m4a", server.uri()),
            "name": "Song",
            "platform": "youtube"
        }));

        let progress = Progress::new();
        let result = dl
            .fetch_track(&track, Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), &progress)
            .await
            .unwrap();
        let path = result.media.local_path().unwrap().to_path_buf();
        assert!(path.starts_with(dir.path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp3"));
        assert_eq!(std::fs::read(&path).unwrap(), b"ID3fallback");
        assert_eq!(result.owned_files(), 1);

        drop(result);
        assert!(!path.exists());
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_api_key_only_sent_to_provider() {
        let dir = tempfile::tempdir().unwrap();
        let api = MockServer::start().await;
        let cdn = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/yt"))
            .and(wiremock::matchers::header("x-api-key", "k"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": format!("{}/v.mp4", cdn.uri())})),
            )
            .expect(1)
            .mount(&api)
            .await;
        Mock::given(wiremock::matchers::header_exists("x-api-key"))
            .respond_with(ResponseTemplate::new(403))
            .expect(0)
            .mount(&cdn)
            .await;
        Mock::given(method("GET"))
            .and(path("/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![5u8; 128]))
            .expect(1)
            .mount(&cdn)
            .await;
        Mock::given(method("GET"))
            .and(path("/cover.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 16]))
            .expect(1)
            .mount(&cdn)
            .await;
        let dl = downloader(dir.path(), &api.uri());

        match dl.direct_video("https://youtu.be/some", &Progress::new()).await {
            DirectVideo::Downloaded(result) => {
                let path = result.media.local_path().unwrap().to_path_buf();
                assert_eq!(std::fs::metadata(&path).unwrap().len(), 128);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let track = detail(serde_json::json!({
            "cdnurl": "https://t.me/dump_chan/77",
            "cover": format!("{}/cover.jpg", cdn.uri()),
            "name": "Song"
        }));
        let result = dl.fetch_track(&track, None, &Progress::new()).await.unwrap();
        assert_eq!(result.thumbnail.map(|t| t.len()), Some(16));
    }

    #[tokio::test]
    async fn test_fetch_image_stays_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/p/1.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNG".to_vec()))
            .mount(&server)
            .await;
        let dl = downloader(dir.path(), &server.uri());

        let result = dl.fetch_image(&format!("{}/p/1.png", server.uri()), "image").await.unwrap();
        assert_eq!(
            result.media,
            crate::download::MediaSource::Bytes {
                name: "image.png".into(),
                data: b"PNG".to_vec()
            }
        );
        assert_eq!(result.owned_files(), 0);
        assert!(dir_is_empty(dir.path()));
    }
}
