//! Plain HTTP transfers: media files streamed to disk and small images kept in memory.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use super::error::DownloadError;
use super::progress::Progress;

/// Streams `url` into `dest`, counting bytes into `progress`.
///
/// Data lands in `<dest>.part` first and is renamed once complete, so a failed
/// transfer never leaves a truncated file under the final name.
pub async fn download_to_file(
    http: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress: &Progress,
) -> Result<PathBuf, DownloadError> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Http(format!("GET {} returned {}", url, status)));
    }
    if let Some(len) = response.content_length() {
        progress.set_total(len);
    }

    let part = part_path(dest);
    let result = stream_body(response, &part, progress).await;
    if let Err(e) = result {
        let _ = fs_err::tokio::remove_file(&part).await;
        return Err(e);
    }

    fs_err::tokio::rename(&part, dest).await?;
    log::debug!("Downloaded {} into {}", url, dest.display());
    Ok(dest.to_path_buf())
}

async fn stream_body(response: reqwest::Response, part: &Path, progress: &Progress) -> Result<(), DownloadError> {
    let mut file = fs_err::tokio::File::create(part).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        progress.add_bytes(chunk.len());
    }
    file.flush().await?;
    if written == 0 {
        return Err(DownloadError::Http("empty response body".to_string()));
    }
    Ok(())
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Downloads a small file into memory, refusing anything above `max_bytes`.
pub async fn fetch_bytes(http: &reqwest::Client, url: &str, max_bytes: usize) -> Result<Vec<u8>, DownloadError> {
    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Http(format!("GET {} returned {}", url, status)));
    }
    if response.content_length().is_some_and(|len| len > max_bytes as u64) {
        return Err(DownloadError::Http(format!("{} is larger than {} bytes", url, max_bytes)));
    }
    let bytes = response.bytes().await?;
    if bytes.is_empty() || bytes.len() > max_bytes {
        return Err(DownloadError::Http(format!("{} has unusable size {}", url, bytes.len())));
    }
    Ok(bytes.to_vec())
}

/// Downloads a cover image into memory.
///
/// Covers are optional, so any failure is logged and yields `None`.
pub async fn fetch_cover(http: &reqwest::Client, url: &str, max_bytes: usize) -> Option<Vec<u8>> {
    if url.trim().is_empty() {
        return None;
    }
    match fetch_bytes(http, url, max_bytes).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::warn!("Cover {} skipped: {}", url, e);
            None
        }
    }
}
