//! yt-dlp subprocess runner with live progress parsing.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use super::error::DownloadError;
use super::progress::Progress;
use crate::core::config::retry;

/// Video selection used for `/vid` and `/yt`: at most 720p mp4 plus m4a audio.
pub const VIDEO_FORMAT: &str = "(bestvideo[height<=?720][width<=?1280][ext=mp4])+(bestaudio[ext=m4a])";

/// What yt-dlp should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Audio extracted to mp3
    Audio,
    /// Video recoded into mp4
    Video,
}

impl Profile {
    pub fn extension(self) -> &'static str {
        match self {
            Profile::Audio => "mp3",
            Profile::Video => "mp4",
        }
    }
}

/// Builds the yt-dlp command line for `url`.
pub fn build_args(profile: Profile, url: &str, output: &Path, proxy: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    match profile {
        Profile::Audio => {
            args.extend(["-f".into(), "bestaudio/best".into()]);
            args.extend(["-x".into(), "--audio-format".into(), "mp3".into()]);
        }
        Profile::Video => {
            args.extend(["-f".into(), VIDEO_FORMAT.into()]);
            args.extend(["--recode-video".into(), "mp4".into()]);
        }
    }
    args.extend([
        "--newline".into(),
        "--no-warnings".into(),
        "--no-part".into(),
        "--no-playlist".into(),
        "--retries".into(),
        retry::YTDLP_RETRIES.to_string(),
    ]);
    if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
        args.extend(["--proxy".into(), proxy.to_string()]);
    }
    args.extend(["-o".into(), output.to_string_lossy().into_owned(), url.to_string()]);
    args
}

/// Runs yt-dlp and feeds every progress line into `progress`.
///
/// Succeeds only if the process exits cleanly and `output` exists afterwards.
pub async fn run(
    ytdl_bin: &str,
    profile: Profile,
    url: &str,
    output: &Path,
    proxy: Option<&str>,
    progress: &Progress,
) -> Result<(), DownloadError> {
    let args = build_args(profile, url, output, proxy);
    log::info!("Running {} ({:?}) for {}", ytdl_bin, profile, url);

    let mut child = Command::new(ytdl_bin)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DownloadError::Process(format!("failed to start {}: {}", ytdl_bin, e)))?;

    // Drained alongside stdout so a chatty run cannot fill the pipe and stall
    let stderr_task = child.stderr.take().map(|stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = BufReader::new(stderr).read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).into_owned()
        })
    });

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(info) = parse_progress(&line) {
                apply(progress, &info);
            }
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| DownloadError::Process(format!("{} did not finish: {}", ytdl_bin, e)))?;
    let stderr = match stderr_task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    };
    if !status.success() {
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        let reason = tail.into_iter().rev().collect::<Vec<_>>().join("\n");
        log::warn!("yt-dlp exited with {:?}: {}", status.code(), reason);
        return Err(DownloadError::Process(if reason.is_empty() {
            format!("yt-dlp exited with {:?}", status.code())
        } else {
            reason
        }));
    }
    if !output.exists() {
        return Err(DownloadError::FileNotFound(output.display().to_string()));
    }
    Ok(())
}

fn apply(progress: &Progress, info: &ProgressInfo) {
    if let Some(total) = info.total_size {
        progress.set_total(total);
    }
    if let Some(current) = info.current_size {
        progress.set_done(current);
    }
}

/// One parsed yt-dlp progress line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressInfo {
    pub percent: f64,
    pub speed_bytes: Option<u64>,
    pub eta_seconds: Option<u64>,
    pub current_size: Option<u64>,
    pub total_size: Option<u64>,
}

/// Parses a line such as `[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10`.
pub fn parse_progress(line: &str) -> Option<ProgressInfo> {
    if !line.contains("[download]") || !line.contains('%') {
        return None;
    }

    let mut percent = None;
    let mut speed_bytes = None;
    let mut eta_seconds = None;
    let mut total_size = None;

    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if let Some(p) = part.strip_suffix('%') {
            if let Ok(p) = p.parse::<f64>() {
                percent = Some(p.clamp(0.0, 100.0));
            }
        }
        let next = parts.get(i + 1).copied();
        match (*part, next) {
            ("of", Some(size)) => total_size = parse_size(size.trim_start_matches('~')),
            ("at", Some(speed)) => speed_bytes = parse_size(speed),
            ("ETA", Some(eta)) => eta_seconds = parse_eta(eta),
            _ => {}
        }
    }

    let percent = percent?;
    let current_size = total_size.map(|total| (total as f64 * percent / 100.0) as u64);
    Some(ProgressInfo {
        percent,
        speed_bytes,
        eta_seconds,
        current_size,
        total_size,
    })
}

/// Parses `10.00MiB`, `500.00KiB/s` or `1.2GiB` into bytes.
fn parse_size(size: &str) -> Option<u64> {
    let size = size.trim_end_matches("/s");
    let units: [(&str, f64); 4] = [
        ("GiB", 1024.0 * 1024.0 * 1024.0),
        ("MiB", 1024.0 * 1024.0),
        ("KiB", 1024.0),
        ("B", 1.0),
    ];
    units.iter().find_map(|(suffix, factor)| {
        size.strip_suffix(suffix)
            .and_then(|n| n.parse::<f64>().ok())
            .map(|n| (n * factor) as u64)
    })
}

/// Parses `mm:ss` or `hh:mm:ss`.
fn parse_eta(eta: &str) -> Option<u64> {
    let parts: Vec<u64> = eta.split(':').map(|p| p.parse().ok()).collect::<Option<_>>()?;
    match parts.as_slice() {
        [m, s] => Some(m * 60 + s),
        [h, m, s] => Some(h * 3600 + m * 60 + s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_progress_full_line() {
        let info = parse_progress("[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10").unwrap();
        assert_eq!(info.percent, 45.2);
        assert_eq!(info.total_size, Some(10 * 1024 * 1024));
        assert_eq!(info.speed_bytes, Some(500 * 1024));
        assert_eq!(info.eta_seconds, Some(10));
        assert_eq!(info.current_size, Some((10_485_760f64 * 45.2 / 100.0) as u64));
    }

    #[test]
    fn test_parse_progress_estimated_size() {
        let info = parse_progress("[download]   3.0% of ~  1.50GiB at  2.00MiB/s ETA 1:02:03").unwrap();
        assert_eq!(info.eta_seconds, Some(3723));
        // "~" followed by a space leaves the size in the next token
        assert_eq!(info.total_size, None);
    }

    #[test]
    fn test_parse_progress_ignores_other_lines() {
        assert!(parse_progress("[download] Destination: out.mp4").is_none());
        assert!(parse_progress("[youtube] abc: Downloading webpage").is_none());
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("1.00KiB"), Some(1024));
        assert_eq!(parse_size("2GiB"), Some(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_size("12B/s"), Some(12));
        assert_eq!(parse_size("Unknown"), None);
    }

    #[test]
    fn test_video_args() {
        let args = build_args(Profile::Video, "https://youtu.be/x", Path::new("/tmp/v.mp4"), Some("socks5://p:1"));
        assert!(args.contains(&VIDEO_FORMAT.to_string()));
        assert!(args.windows(2).any(|w| w == ["--recode-video", "mp4"]));
        assert!(args.windows(2).any(|w| w == ["--proxy", "socks5://p:1"]));
        assert!(args.windows(2).any(|w| w == ["--retries", "2"]));
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/x"));
    }

    #[test]
    fn test_audio_args_without_proxy() {
        let args = build_args(Profile::Audio, "https://youtu.be/x", Path::new("a.mp3"), None);
        assert!(args.windows(2).any(|w| w == ["--audio-format", "mp3"]));
        assert!(!args.contains(&"--proxy".to_string()));
    }

    #[tokio::test]
    async fn test_run_reports_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            "/nonexistent/yt-dlp",
            Profile::Audio,
            "https://youtu.be/x",
            &dir.path().join("a.mp3"),
            None,
            &Progress::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DownloadError::Process(_)));
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("yt-dlp");
        let header = "#!/bin/sh\nfor a in \"$@\"; do [ \"$prev\" = \"-o\" ] && out=$a; prev=$a; done\n";
        std::fs::write(&path, format!("{}{}", header, body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_survives_large_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(
            dir.path(),
            "head -c 300000 /dev/zero | tr '\\0' 'w' >&2\n\
             echo \"[download] 100.0% of 1.00KiB at 1.00KiB/s ETA 00:00\"\n\
             printf 'ID3' > \"$out\"\n",
        );
        let output = dir.path().join("song.mp3");
        let progress = Progress::new();

        let run = run(&bin, Profile::Audio, "https://youtu.be/x", &output, None, &progress);
        tokio::time::timeout(std::time::Duration::from_secs(20), run)
            .await
            .expect("yt-dlp run stalled")
            .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"ID3");
        assert_eq!(progress.snapshot().total, 1024);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_failure_reports_stderr_tail() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(dir.path(), "echo 'ERROR: Video unavailable' >&2\nexit 1\n");
        let output = dir.path().join("song.mp3");

        let err = run(&bin, Profile::Audio, "https://youtu.be/x", &output, None, &Progress::new())
            .await
            .unwrap_err();
        match err {
            DownloadError::Process(reason) => assert_eq!(reason, "ERROR: Video unavailable"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
