//! Stream inspection with ffprobe.

use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Arguments asking ffprobe to list the audio streams of `url`.
pub fn audio_probe_args(url: &str) -> Vec<String> {
    [
        "-v",
        "error",
        "-select_streams",
        "a",
        "-show_entries",
        "stream=index",
        "-of",
        "csv=p=0",
        "-user_agent",
        "Mozilla/5.0",
        url,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Returns true if the media at `url` has at least one audio stream.
///
/// Any probe failure (missing binary, timeout, bad exit) counts as "no audio", so
/// such videos are sent as animations.
pub async fn has_audio_stream(ffprobe_bin: &str, url: &str) -> bool {
    let run = tokio::process::Command::new(ffprobe_bin)
        .args(audio_probe_args(url))
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(PROBE_TIMEOUT, run).await {
        Ok(Ok(output)) if output.status.success() => !String::from_utf8_lossy(&output.stdout).trim().is_empty(),
        Ok(Ok(output)) => {
            log::debug!(
                "ffprobe exited with {} for {}: {}",
                output.status,
                url,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            false
        }
        Ok(Err(e)) => {
            log::warn!("Failed to run {}: {}", ffprobe_bin, e);
            false
        }
        Err(_) => {
            log::warn!("ffprobe timed out for {}", url);
            false
        }
    }
}
