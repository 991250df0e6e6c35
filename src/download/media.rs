//! Media produced by the download pipeline and the guard that owns its temp files.

use std::path::{Path, PathBuf};

/// Where the bytes to send come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A finished file on local disk.
    LocalPath(PathBuf),
    /// An internal `t.me/<channel>/<message>` link that must be turned into a file id.
    RemoteRef(String),
    /// In-memory bytes with the file name shown to the user.
    Bytes { name: String, data: Vec<u8> },
}

impl MediaSource {
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            MediaSource::LocalPath(path) => Some(path),
            _ => None,
        }
    }
}

/// Deletes its file when dropped.
///
/// One guard per request-scoped temp file, so every exit path (success, error,
/// panic unwinding) leaves the download directory clean.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed temp file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove temp file {}: {}", self.path.display(), e),
        }
    }
}

/// Downloaded media plus the optional thumbnail and the guards that keep it alive.
#[derive(Debug)]
pub struct DownloadResult {
    pub media: MediaSource,
    pub thumbnail: Option<Vec<u8>>,
    guards: Vec<TempFile>,
}

impl DownloadResult {
    pub fn remote(link: impl Into<String>, thumbnail: Option<Vec<u8>>) -> Self {
        Self {
            media: MediaSource::RemoteRef(link.into()),
            thumbnail,
            guards: Vec::new(),
        }
    }

    /// Wraps a finished local file; the file is removed when the result is dropped.
    pub fn local(file: TempFile, thumbnail: Option<Vec<u8>>) -> Self {
        Self {
            media: MediaSource::LocalPath(file.path().to_path_buf()),
            thumbnail,
            guards: vec![file],
        }
    }

    /// Media held in memory; nothing touches the disk.
    pub fn bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media: MediaSource::Bytes {
                name: name.into(),
                data,
            },
            thumbnail: None,
            guards: Vec::new(),
        }
    }

    /// Refers to a file the caller owns; nothing is removed on drop.
    pub fn existing(path: impl Into<PathBuf>) -> Self {
        Self {
            media: MediaSource::LocalPath(path.into()),
            thumbnail: None,
            guards: Vec::new(),
        }
    }

    /// Moves the local file guard out, leaving cleanup to the caller.
    pub fn take_file(&mut self) -> Option<TempFile> {
        self.guards.pop()
    }

    /// Number of temp files this result still owns.
    pub fn owned_files(&self) -> usize {
        self.guards.len()
    }
}
