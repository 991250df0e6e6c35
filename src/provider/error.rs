use thiserror::Error;

/// Failures of the search/metadata provider.
///
/// Each variant keeps the provider's own wording so handlers can show the root cause.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Empty query, blank identifier, or a malformed/oversized URL
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The URL does not belong to any supported platform
    #[error("unsupported URL: {0}")]
    UnsupportedUrl(String),
    /// The provider answered but had nothing for the request
    #[error("nothing found for {0}")]
    NotFound(String),
    /// Transport failure, non-2xx status, or an undecodable body
    #[error("provider error: {0}")]
    Remote(String),
}

impl ProviderError {
    /// Returns subcategory for logging
    pub fn subcategory(&self) -> &'static str {
        match self {
            ProviderError::InvalidInput(_) => "invalid_input",
            ProviderError::UnsupportedUrl(_) => "unsupported_url",
            ProviderError::NotFound(_) => "not_found",
            ProviderError::Remote(_) => "remote",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Remote(format!("failed to decode response: {}", err))
        } else if err.is_timeout() {
            ProviderError::Remote("request timed out".to_string())
        } else {
            ProviderError::Remote(format!("request failed: {}", err))
        }
    }
}
