//! Bundles several tracks into one ZIP archive for `/playlist`.

use std::io::Write;
use std::path::PathBuf;

use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use super::error::DownloadError;
use super::media::{MediaSource, TempFile};
use super::orchestrator::Downloader;
use super::progress::Progress;
use crate::core::utils::{escape_filename, unique_path};
use crate::provider::Track;

/// Outcome of a playlist download.
#[derive(Debug)]
pub struct ZipResult {
    pub archive: TempFile,
    pub success_count: usize,
    /// One line per track that could not be added
    pub errors: Vec<String>,
}

impl ZipResult {
    pub fn path(&self) -> &std::path::Path {
        self.archive.path()
    }
}

/// Downloads every track and writes the successes into a ZIP archive.
///
/// Individual failures are collected; only an archive with no entries is an error.
pub async fn zip_tracks(downloader: &Downloader, tracks: &[Track]) -> Result<ZipResult, DownloadError> {
    let mut entries: Vec<(String, TempFile)> = Vec::new();
    let mut errors = Vec::new();

    for (index, track) in tracks.iter().enumerate() {
        match download_one(downloader, track).await {
            Ok(file) => {
                let ext = file
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("mp3")
                    .to_string();
                let name = escape_filename(&format!("{:02} - {}.{}", index + 1, track.label(), ext));
                entries.push((name, file));
            }
            Err(e) => {
                log::warn!("Playlist track {} failed: {}", track.id, e);
                errors.push(format!("track {}: {}", track.id, e));
            }
        }
    }

    if entries.is_empty() {
        return Err(DownloadError::Failed("no tracks were added to the archive".to_string()));
    }

    fs_err::tokio::create_dir_all(downloader.download_dir()).await?;
    let archive = TempFile::new(unique_path(downloader.download_dir(), "tracks", "zip"));
    let archive_path = archive.path().to_path_buf();
    let sources: Vec<(String, PathBuf)> = entries.iter().map(|(n, f)| (n.clone(), f.path().to_path_buf())).collect();

    tokio::task::spawn_blocking(move || write_archive(&archive_path, &sources))
        .await
        .map_err(|e| DownloadError::Failed(format!("archive task failed: {}", e)))??;

    Ok(ZipResult {
        archive,
        success_count: entries.len(),
        errors,
    })
}

async fn download_one(downloader: &Downloader, track: &Track) -> Result<TempFile, DownloadError> {
    let reference = if track.url.is_empty() { &track.id } else { &track.url };
    let detail = downloader.provider().resolve_track(reference).await?;
    let mut result = downloader
        .fetch_track(&detail, Some(&track.url), &Progress::new())
        .await?;
    match result.media {
        MediaSource::LocalPath(_) => result
            .take_file()
            .ok_or_else(|| DownloadError::FileNotFound(track.id.clone())),
        _ => Err(DownloadError::Failed("track is only available as a chat reference".to_string())),
    }
}

fn write_archive(path: &std::path::Path, sources: &[(String, PathBuf)]) -> Result<(), DownloadError> {
    let file = fs_err::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, source) in sources {
        zip.start_file(name.as_str(), options)
            .map_err(|e| DownloadError::Failed(format!("zip entry {}: {}", name, e)))?;
        let data = fs_err::read(source)?;
        zip.write_all(&data)?;
    }
    zip.finish()
        .map_err(|e| DownloadError::Failed(format!("zip finish: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_write_archive_contains_entries() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.ogg");
        std::fs::write(&a, b"first").unwrap();
        std::fs::write(&b, b"second").unwrap();
        let out = dir.path().join("out.zip");

        write_archive(
            &out,
            &[("01 - A.mp3".to_string(), a), ("02 - B.ogg".to_string(), b)],
        )
        .unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&out).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut content = String::new();
        archive.by_name("02 - B.ogg").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "second");
    }
}
