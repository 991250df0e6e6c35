use thiserror::Error;

use crate::provider::ProviderError;

/// Structured error type for download operations.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The provider refused or failed to describe the media
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// HTTP transfer of a media file failed
    #[error("{0}")]
    Http(String),
    /// yt-dlp or ffmpeg failed to start or exited with an error
    #[error("{0}")]
    Process(String),
    /// The encrypted stream could not be decoded
    #[error("{0}")]
    Decrypt(String),
    /// Expected file not found after processing
    #[error("{0}")]
    FileNotFound(String),
    /// Every remote and local path was exhausted
    #[error("download failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Returns subcategory for logging
    pub fn subcategory(&self) -> &'static str {
        match self {
            DownloadError::Provider(_) => "provider",
            DownloadError::Http(_) => "http",
            DownloadError::Process(_) => "process",
            DownloadError::Decrypt(_) => "decrypt",
            DownloadError::FileNotFound(_) => "file_not_found",
            DownloadError::Failed(_) => "failed",
            DownloadError::Io(_) => "io",
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        DownloadError::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_display() {
        let err = DownloadError::Process("yt-dlp exited with 1".into());
        assert_eq!(err.to_string(), "yt-dlp exited with 1");
        let err = DownloadError::Failed("no source left".into());
        assert_eq!(err.to_string(), "download failed: no source left");
    }

    #[test]
    fn test_download_error_subcategory() {
        assert_eq!(DownloadError::Http("".into()).subcategory(), "http");
        assert_eq!(DownloadError::Decrypt("".into()).subcategory(), "decrypt");
        assert_eq!(
            DownloadError::Provider(ProviderError::NotFound("x".into())).subcategory(),
            "provider"
        );
    }

    #[test]
    fn test_provider_error_is_transparent() {
        let err: DownloadError = ProviderError::NotFound("track 1".into()).into();
        assert_eq!(err.to_string(), "nothing found for track 1");
    }
}
