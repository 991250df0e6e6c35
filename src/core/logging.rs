//! Logging initialization (console + file) and startup diagnostics

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config::Config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    let config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(LevelFilter::Info, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(LevelFilter::Info, config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at startup without exposing secrets.
pub fn log_startup_configuration(config: &Config) {
    log::info!("Provider API: {}", config.api_url);
    log::info!("Download directory: {}", config.download_path.display());
    log::info!("yt-dlp binary: {}", config.ytdl_bin);

    match &config.proxy {
        Some(_) => log::info!("Proxy: configured"),
        None => log::info!("Proxy: none"),
    }

    match config.logger_id {
        Some(chat) => log::info!("Inline dump chat: {}", chat),
        None => log::warn!("LOGGER_ID not set, inline uploads go through the requesting user's chat"),
    }

    if config.restart_url.is_some() != config.coolify_token.is_some() {
        log::warn!("Restart webhook needs both RESTART_URL and COOLIFY_TOKEN; /restart is disabled");
    }

    if let Some(url) = &config.bot_api_url {
        log::info!("Custom Bot API URL: {}", url);
        if config.api_id.is_none() || config.api_hash.is_none() {
            log::warn!("BOT_API_URL is set but API_ID/API_HASH are missing");
        }
    }
}
