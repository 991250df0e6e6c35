use thiserror::Error;

use crate::core::config::ConfigError;
use crate::download::DownloadError;
use crate::provider::ProviderError;
use crate::telegram::token::TokenError;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Chat-visible text for this error.
    ///
    /// Input problems and "nothing found" are phrased for the user; everything else
    /// gets a generic failure line plus the underlying cause.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Provider(ProviderError::InvalidInput(reason)) | AppError::Validation(reason) => {
                format!("❗ {}", reason)
            }
            AppError::Provider(ProviderError::UnsupportedUrl(_)) => "😢 This link is not supported.".to_string(),
            AppError::Provider(ProviderError::NotFound(_))
            | AppError::Download(DownloadError::Provider(ProviderError::NotFound(_))) => {
                "😔 No results found.".to_string()
            }
            AppError::Provider(e @ ProviderError::Remote(_)) => format!("⚠️ Provider request failed.\n{}", e),
            AppError::Download(e) => format!("⚠️ Failed to download.\n{}", e),
            AppError::Token(_) => "❌ Invalid selection.".to_string(),
            AppError::Telegram(e) => format!("❌ Failed to send the file.\n{}", e),
            other => format!("⚠️ Something went wrong.\n{}", other),
        }
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Validation(s)
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Validation(s.to_string())
    }
}
