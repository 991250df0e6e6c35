//! HTTP client for the search/metadata/download provider.
//!
//! Every call is one GET with a bounded timeout, authenticated by the static
//! `X-API-Key` header set on that request. Non-2xx statuses and undecodable bodies surface as
//! [`ProviderError::Remote`] with the provider's own reason attached.

use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::classify::{match_platform, with_scheme};
use super::error::ProviderError;
use super::types::{SearchResult, SnapResult, TrackDetail, VideoLink};
use crate::core::config::{self, limits, Config};
use crate::core::utils::truncate_chars;

const HEADER_API_KEY: &str = "X-API-Key";

/// Cloneable provider client; clones share one connection pool.
///
/// The API key goes out on provider requests only. Media hosts are reached
/// through the downloader's own client.
#[derive(Clone, Debug)]
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    key_header: HeaderValue,
}

impl ProviderClient {
    /// Creates a client for `base_url` authenticated with `api_key`.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ProviderError> {
        let mut key_header = HeaderValue::from_str(api_key)
            .map_err(|_| ProviderError::InvalidInput("API key contains invalid header characters".to_string()))?;
        key_header.set_sensitive(true);

        let http = reqwest::Client::builder()
            .timeout(config::network::provider_timeout())
            .build()
            .map_err(|e| ProviderError::Remote(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            key_header,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        Self::new(&config.api_url, &config.api_key)
    }

    /// Resolves a supported platform URL into its track list.
    pub async fn resolve_url(&self, raw_url: &str) -> Result<SearchResult, ProviderError> {
        let raw_url = raw_url.trim();
        if raw_url.is_empty() {
            return Err(ProviderError::InvalidInput("empty URL".to_string()));
        }
        if match_platform(raw_url).is_none() {
            return Err(ProviderError::UnsupportedUrl(raw_url.to_string()));
        }

        let endpoint = format!("{}/get_url?url={}", self.base_url, urlencoding::encode(&with_scheme(raw_url)));
        let result: SearchResult = self.get_json(&endpoint).await?;
        if result.is_empty() {
            return Err(ProviderError::NotFound(raw_url.to_string()));
        }
        log::info!("Resolved {} into {} tracks", raw_url, result.len());
        Ok(result)
    }

    /// Free-text search. A missing or blank `limit` uses the provider default.
    pub async fn search(&self, query: &str, limit: Option<&str>) -> Result<SearchResult, ProviderError> {
        let query = truncate_chars(query.trim(), limits::MAX_QUERY_LENGTH);
        if query.is_empty() {
            return Err(ProviderError::InvalidInput("empty search query".to_string()));
        }
        let limit = limit
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(limits::DEFAULT_SEARCH_LIMIT);

        let endpoint = format!(
            "{}/search_track/{}?lim={}",
            self.base_url,
            urlencoding::encode(query),
            urlencoding::encode(limit)
        );
        let result: SearchResult = self.get_json(&endpoint).await?;
        if result.is_empty() {
            return Err(ProviderError::NotFound(query.to_string()));
        }
        log::debug!("Search '{}' returned {} tracks", query, result.len());
        Ok(result)
    }

    /// Fetches full detail for a track id or track URL.
    pub async fn resolve_track(&self, id: &str) -> Result<TrackDetail, ProviderError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ProviderError::InvalidInput("empty track id".to_string()));
        }

        let endpoint = format!("{}/get_track?id={}", self.base_url, urlencoding::encode(id));
        let response = self.send(&endpoint).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(id.to_string()));
        }
        let detail: TrackDetail = Self::decode(response).await?;
        if detail.cdnurl.is_empty() && detail.name.is_empty() {
            return Err(ProviderError::NotFound(id.to_string()));
        }
        Ok(detail)
    }

    /// Extracts media from a social post URL.
    pub async fn snap(&self, raw_url: &str) -> Result<SnapResult, ProviderError> {
        let raw_url = raw_url.trim();
        if raw_url.is_empty() || raw_url.len() > limits::MAX_URL_LENGTH {
            return Err(ProviderError::InvalidInput("invalid snap URL".to_string()));
        }
        let endpoint = format!("{}/snap?url={}", self.base_url, urlencoding::encode(raw_url));
        let result: SnapResult = self.get_json(&endpoint).await?;
        if result.is_empty() {
            return Err(ProviderError::NotFound(raw_url.to_string()));
        }
        Ok(result)
    }

    /// Asks the provider for a direct video file URL. `Ok(None)` means it has none.
    pub async fn video_link(&self, raw_url: &str) -> Result<Option<String>, ProviderError> {
        let raw_url = raw_url.trim();
        if raw_url.is_empty() {
            return Err(ProviderError::InvalidInput("empty video URL".to_string()));
        }
        let endpoint = format!(
            "{}/yt?api_key={}&id={}&video=true",
            self.base_url,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(raw_url)
        );
        let link: VideoLink = self.get_json(&endpoint).await?;
        let link = link.results.trim().to_string();
        Ok(if link.is_empty() { None } else { Some(link) })
    }

    async fn send(&self, endpoint: &str) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .http
            .get(endpoint)
            .header(HEADER_API_KEY, self.key_header.clone())
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await?;
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ProviderError> {
        let response = self.send(endpoint).await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = truncate_chars(body.trim(), 200);
            log::warn!("Provider returned {}: {}", status, reason);
            return Err(ProviderError::Remote(if reason.is_empty() {
                format!("request failed with status {}", status)
            } else {
                format!("request failed with status {}: {}", status, reason)
            }));
        }
        Ok(response.json::<T>().await?)
    }
}
