//! Process-wide configuration.
//!
//! [`Config`] is read once at startup and shared as `Arc<Config>`; nothing mutates it
//! afterwards. Tunable constants that never come from the environment live in the
//! nested modules below.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Fallback owner when `OWNER_ID` is not set.
pub const DEFAULT_OWNER_ID: u64 = 5_938_660_179;

/// Configuration errors raised while reading the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing mandatory environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Immutable runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub api_key: String,
    /// Provider base URL, stored without a trailing slash.
    pub api_url: String,
    pub api_id: Option<String>,
    pub api_hash: Option<String>,
    pub bot_api_url: Option<String>,
    pub proxy: Option<String>,
    pub coolify_token: Option<String>,
    pub restart_url: Option<String>,
    /// Chat used to obtain file ids for inline deliveries.
    pub logger_id: Option<i64>,
    pub owner_id: u64,
    pub download_path: PathBuf,
    pub ytdl_bin: String,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub log_file_path: String,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let bot_token = get("TOKEN").or_else(|| get("BOT_TOKEN")).ok_or(ConfigError::Missing("TOKEN"))?;
        let api_key = require("API_KEY")?;
        let api_url = require("API_URL")?.trim_end_matches('/').to_string();
        url::Url::parse(&api_url).map_err(|_| ConfigError::Invalid {
            name: "API_URL",
            value: api_url.clone(),
        })?;

        let logger_id = match get("LOGGER_ID") {
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| ConfigError::Invalid {
                name: "LOGGER_ID",
                value: raw,
            })?),
            None => None,
        };

        let owner_id = match get("OWNER_ID") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "OWNER_ID",
                value: raw,
            })?,
            None => DEFAULT_OWNER_ID,
        };

        let download_path = get("DOWNLOAD_PATH").unwrap_or_else(|| "downloads".to_string());
        let download_path = PathBuf::from(shellexpand::tilde(&download_path).into_owned());

        Ok(Self {
            bot_token,
            api_key,
            api_url,
            api_id: get("API_ID"),
            api_hash: get("API_HASH"),
            bot_api_url: get("BOT_API_URL"),
            proxy: get("PROXY"),
            coolify_token: get("COOLIFY_TOKEN"),
            restart_url: get("RESTART_URL"),
            logger_id,
            owner_id,
            download_path,
            ytdl_bin: get("YTDL_BIN").unwrap_or_else(|| "yt-dlp".to_string()),
            ffmpeg_bin: get("FFMPEG_BIN").unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_bin: get("FFPROBE_BIN").unwrap_or_else(|| "ffprobe".to_string()),
            log_file_path: get("LOG_FILE_PATH").unwrap_or_else(|| "sptube.log".to_string()),
        })
    }

    /// Returns true if `user_id` is the configured owner.
    pub fn is_owner(&self, user_id: u64) -> bool {
        user_id == self.owner_id
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Provider request timeout (in seconds)
    pub const PROVIDER_TIMEOUT_SECS: u64 = 60;

    /// Connect timeout for media hosts (in seconds)
    pub const MEDIA_CONNECT_TIMEOUT_SECS: u64 = 15;

    /// Longest silence tolerated mid-transfer from a media host (in seconds)
    pub const MEDIA_READ_TIMEOUT_SECS: u64 = 60;

    /// Timeout for the external restart webhook (in seconds)
    pub const RESTART_TIMEOUT_SECS: u64 = 10;

    /// Bot API client timeout; uploads of large files need headroom
    pub const BOT_API_TIMEOUT_SECS: u64 = 600;

    pub fn provider_timeout() -> Duration {
        Duration::from_secs(PROVIDER_TIMEOUT_SECS)
    }

    pub fn media_connect_timeout() -> Duration {
        Duration::from_secs(MEDIA_CONNECT_TIMEOUT_SECS)
    }

    pub fn media_read_timeout() -> Duration {
        Duration::from_secs(MEDIA_READ_TIMEOUT_SECS)
    }

    pub fn restart_timeout() -> Duration {
        Duration::from_secs(RESTART_TIMEOUT_SECS)
    }

    pub fn bot_api_timeout() -> Duration {
        Duration::from_secs(BOT_API_TIMEOUT_SECS)
    }
}

/// Input and payload limits
pub mod limits {
    /// Longest string accepted as a platform URL
    pub const MAX_URL_LENGTH: usize = 2048;

    /// Search text is truncated to this many characters
    pub const MAX_QUERY_LENGTH: usize = 100;

    /// Provider default when no limit is given
    pub const DEFAULT_SEARCH_LIMIT: &str = "10";

    /// Results offered as buttons in chats
    pub const CHAT_SEARCH_LIMIT: &str = "5";

    /// Results offered in inline mode
    pub const INLINE_SEARCH_LIMIT: &str = "15";

    /// Buttons per selection keyboard
    pub const MAX_KEYBOARD_TRACKS: usize = 50;

    /// Telegram limit for callback data
    pub const MAX_CALLBACK_DATA_BYTES: usize = 64;

    /// Telegram limit for media groups
    pub const ALBUM_BATCH_SIZE: usize = 10;

    /// Largest cover image we keep as a thumbnail
    pub const MAX_COVER_BYTES: usize = 10 * 1024 * 1024;

    /// Telegram limit for uploaded photos; post images are held in memory up to this
    pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;
}

/// Retry configuration
pub mod retry {
    use super::Duration;

    /// Delay before retrying an upload that failed with MEDIA_EMPTY (in milliseconds)
    pub const EMPTY_MEDIA_DELAY_MS: u64 = 1000;

    /// `--retries` passed to yt-dlp
    pub const YTDLP_RETRIES: u32 = 2;

    pub fn empty_media_delay() -> Duration {
        Duration::from_millis(EMPTY_MEDIA_DELAY_MS)
    }
}

/// Progress reporting configuration
pub mod progress {
    use super::Duration;

    /// Interval between download progress edits (in seconds)
    pub const DOWNLOAD_TICK_SECS: u64 = 7;

    /// Interval between upload progress edits (in seconds)
    pub const UPLOAD_TICK_SECS: u64 = 5;

    /// Cells in the progress bar
    pub const BAR_LENGTH: usize = 10;

    pub fn download_tick() -> Duration {
        Duration::from_secs(DOWNLOAD_TICK_SECS)
    }

    pub fn upload_tick() -> Duration {
        Duration::from_secs(UPLOAD_TICK_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("TOKEN", "123:abc"),
            ("API_KEY", "secret"),
            ("API_URL", "https://api.example.com/"),
        ]
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_lookup(lookup(&minimal())).unwrap();
        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.owner_id, DEFAULT_OWNER_ID);
        assert_eq!(config.download_path, PathBuf::from("downloads"));
        assert_eq!(config.ytdl_bin, "yt-dlp");
        assert!(config.proxy.is_none());
        assert!(config.logger_id.is_none());
    }

    #[test]
    fn test_missing_mandatory_variable() {
        let pairs = [("TOKEN", "123:abc"), ("API_URL", "https://api.example.com")];
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("API_KEY"));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let pairs = [("TOKEN", "  "), ("API_KEY", "k"), ("API_URL", "https://api.example.com")];
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TOKEN"));
    }

    #[test]
    fn test_bot_token_alias() {
        let pairs = [("BOT_TOKEN", "1:x"), ("API_KEY", "k"), ("API_URL", "https://api.example.com")];
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.bot_token, "1:x");
    }

    #[test]
    fn test_invalid_logger_id() {
        let mut pairs = minimal();
        pairs.push(("LOGGER_ID", "not-a-number"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "LOGGER_ID", .. }));
    }

    #[test]
    fn test_owner_override() {
        let mut pairs = minimal();
        pairs.push(("OWNER_ID", "42"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert!(config.is_owner(42));
        assert!(!config.is_owner(DEFAULT_OWNER_ID));
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_reads_process_environment() {
        env::set_var("TOKEN", "7:env");
        env::set_var("API_KEY", "env-key");
        env::set_var("API_URL", "https://env.example.com");
        env::set_var("LOGGER_ID", "-1001234567890");

        let config = Config::from_env();

        for key in ["TOKEN", "API_KEY", "API_URL", "LOGGER_ID"] {
            env::remove_var(key);
        }
        let config = config.unwrap();
        assert_eq!(config.bot_token, "7:env");
        assert_eq!(config.logger_id, Some(-1_001_234_567_890));
    }
}
