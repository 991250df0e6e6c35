//! Bot initialization and command definitions
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command menu registration

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

use crate::core::config::{self, Config};

/// Bot commands. `!cmd` is accepted as an alias of `/cmd`, see [`parse_command`].
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "show the welcome message")]
    Help,
    #[command(description = "check latency and uptime")]
    Ping,
    #[command(description = "privacy policy")]
    Privacy,
    #[command(description = "download a track by link or search")]
    Spotify(String),
    #[command(description = "download a video")]
    Vid(String),
    #[command(description = "download a video (alias of /vid)")]
    Yt(String),
    #[command(description = "download a playlist as a zip archive")]
    Playlist(String),
    #[command(description = "download an Instagram, Pinterest or Facebook post")]
    Insta(String),
    #[command(description = "save the replied media to disk (owner only)")]
    Dl,
    #[command(description = "upload a file from disk (owner only)")]
    Ul(String),
    #[command(description = "restart the deployment (owner only)")]
    Restart,
}

/// Parses `/cmd`, `/cmd@bot` and `!cmd` forms.
pub fn parse_command(text: &str, bot_username: &str) -> Option<Command> {
    let text = text.trim_start();
    let normalized = match text.strip_prefix('!') {
        Some(rest) => format!("/{}", rest),
        None => text.to_string(),
    };
    Command::parse(&normalized, bot_username).ok()
}

/// Creates a Bot instance with custom or default API URL
pub fn create_bot(config: &Config) -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::bot_api_timeout()).build()?;
    let bot = Bot::with_client(config.bot_token.clone(), client);

    // A self-hosted Bot API server lifts the upload size limits
    let bot = match &config.bot_api_url {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        None => bot,
    };

    Ok(bot)
}

/// Publishes the public command list in the Telegram UI. Owner commands stay hidden.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(vec![
        BotCommand::new("start", "show the welcome message"),
        BotCommand::new("help", "show the welcome message"),
        BotCommand::new("ping", "check latency and uptime"),
        BotCommand::new("privacy", "privacy policy"),
        BotCommand::new("spotify", "download a track by link or search"),
        BotCommand::new("vid", "download a video"),
        BotCommand::new("playlist", "download a playlist as a zip archive"),
        BotCommand::new("insta", "download an Instagram, Pinterest or Facebook post"),
    ])
    .await?;

    Ok(())
}
