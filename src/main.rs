use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tokio::time::sleep;

use sptube::cli::{lookup_json, Cli, Commands};
use sptube::core::{init_logger, log_startup_configuration, Config};
use sptube::download::Downloader;
use sptube::provider::ProviderClient;
use sptube::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Attempts made while the Bot API is still coming up.
const STARTUP_MAX_RETRIES: u32 = 12;

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (configuration, logging, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics from handler tasks instead of letting them vanish on stderr
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    let config = Arc::new(Config::from_env()?);

    match cli.command {
        None | Some(Commands::Run) => {
            init_logger(&config.log_file_path)?;
            run_bot(config).await
        }
        // Lookups keep stdout clean for the JSON
        Some(lookup) => {
            let client = ProviderClient::from_config(&config)?;
            println!("{}", lookup_json(&client, &lookup).await?);
            Ok(())
        }
    }
}

async fn run_bot(config: Arc<Config>) -> Result<()> {
    log::info!("Starting bot v{}...", env!("CARGO_PKG_VERSION"));
    log_startup_configuration(&config);

    fs_err::tokio::create_dir_all(&config.download_path).await?;

    let provider = ProviderClient::from_config(&config)?;
    let downloader = Downloader::new(Arc::clone(&config), provider)?;
    let bot = create_bot(&config)?;

    // A freshly started self-hosted Bot API answers "restart" for a while
    let me = {
        let mut attempt = 0;
        loop {
            match bot.get_me().await {
                Ok(me) => break me,
                Err(e) => {
                    attempt += 1;
                    if attempt >= STARTUP_MAX_RETRIES {
                        return Err(anyhow::anyhow!(
                            "Failed to connect to Bot API after {} retries: {}",
                            attempt,
                            e
                        ));
                    }
                    log::warn!(
                        "Bot API not ready (attempt {}/{}): {}. Retrying in 5 seconds...",
                        attempt,
                        STARTUP_MAX_RETRIES,
                        e
                    );
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }
    };
    log::info!("Logged in as @{}", me.username());

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let deps = HandlerDeps::new(config, downloader, &me);

    // No per-chat queue: a long download must not hold up other requests in the same chat
    Dispatcher::builder(bot, schema(deps))
        .distribution_function(|_| None::<()>)
        .enable_ctrlc_handler()
        .error_handler(LoggingErrorHandler::with_custom_text("An error has occurred in the dispatcher"))
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
