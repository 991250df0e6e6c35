//! Owner-only commands: /dl, /ul and /restart. Other senders get no reaction.

use futures_util::StreamExt;
use teloxide::net::Download;
use teloxide::prelude::*;
use tokio::io::AsyncWriteExt;

use super::messages::reply_html;
use super::types::{report_error, HandlerDeps, HandlerError};
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::download::orchestrator::owner_download_path;
use crate::download::{DownloadResult, Progress};
use crate::telegram::bot::Command;
use crate::telegram::delivery::{deliver_document, media_file_id};
use crate::telegram::status::{spawn_ticker, MessageTarget};

/// Returns true for the commands this module serves.
pub fn is_owner_command(cmd: &Command) -> bool {
    matches!(cmd, Command::Dl | Command::Ul(_) | Command::Restart)
}

pub(super) async fn handle_owner_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    cmd: Command,
) -> Result<(), HandlerError> {
    log::info!("Owner command {:?} in chat {}", cmd, msg.chat.id);
    let result = match cmd {
        Command::Dl => handle_dl_command(bot, msg, deps).await,
        Command::Ul(path) => handle_ul_command(bot, msg, &path).await,
        Command::Restart => handle_restart_command(bot, msg, deps).await,
        _ => Ok(()),
    };
    if let Err(e) = result {
        report_error(bot, msg, "Owner command", &e).await;
    }
    Ok(())
}

/// Name for a saved file: the original file name when Telegram has one.
fn attachment_name(msg: &Message) -> Option<String> {
    msg.document()
        .and_then(|d| d.file_name.clone())
        .or_else(|| msg.audio().and_then(|a| a.file_name.clone()))
        .or_else(|| msg.video().and_then(|v| v.file_name.clone()))
        .or_else(|| msg.animation().and_then(|a| a.file_name.clone()))
}

/// /dl: saves the replied-to media into the downloads directory.
async fn handle_dl_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let Some(target) = msg.reply_to_message() else {
        reply_html(bot, msg, "❗ Reply to a message with media.").await?;
        return Ok(());
    };
    let Some(file_id) = media_file_id(target) else {
        reply_html(bot, msg, "❗ The replied message has no downloadable media.").await?;
        return Ok(());
    };

    let status_msg = reply_html(bot, msg, "⏬ Downloading...").await?;
    let status = MessageTarget::of(&status_msg);
    let file = bot.get_file(file_id).await?;
    let name = attachment_name(target).unwrap_or_else(|| format!("{}.bin", file.unique_id));
    let dest = owner_download_path(&deps.config.download_path, &name);
    fs_err::tokio::create_dir_all(&deps.config.download_path).await?;

    let progress = Progress::with_total(u64::from(file.size));
    let ticker = spawn_ticker(
        bot.clone(),
        status.clone(),
        progress.clone(),
        "Downloading",
        &name,
        config::progress::download_tick(),
    );
    let saved = save_stream(bot, &file.path, &dest, &progress).await;
    ticker.abort();

    match saved {
        Ok(()) => {
            log::info!("Saved {} to {}", name, dest.display());
            status
                .set_text(
                    bot,
                    format!(
                        "✅ Saved to <code>{}</code>",
                        teloxide::utils::html::escape(&dest.display().to_string())
                    ),
                )
                .await;
            Ok(())
        }
        Err(e) => {
            if let Err(rm) = fs_err::tokio::remove_file(&dest).await {
                log::debug!("Nothing to clean up at {}: {}", dest.display(), rm);
            }
            status.delete(bot).await;
            Err(e)
        }
    }
}

async fn save_stream(bot: &Bot, remote_path: &str, dest: &std::path::Path, progress: &Progress) -> AppResult<()> {
    let mut out = fs_err::tokio::File::create(dest).await?;
    let mut stream = bot.download_file_stream(remote_path);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AppError::Validation(format!("download interrupted: {}", e)))?;
        out.write_all(&chunk).await?;
        progress.add_bytes(chunk.len());
    }
    out.flush().await?;
    Ok(())
}

/// /ul <path>: uploads a local file as a document. The file is left in place.
async fn handle_ul_command(bot: &Bot, msg: &Message, path: &str) -> AppResult<()> {
    let path = path.trim();
    if path.is_empty() {
        reply_html(bot, msg, "❗ Usage: <code>/ul &lt;path&gt;</code>").await?;
        return Ok(());
    }
    let path = std::path::PathBuf::from(shellexpand::tilde(path).into_owned());
    if !fs_err::tokio::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
        reply_html(
            bot,
            msg,
            format!("❗ No such file: <code>{}</code>", teloxide::utils::html::escape(&path.display().to_string())),
        )
        .await?;
        return Ok(());
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let status_msg = reply_html(bot, msg, "⏫ Uploading...").await?;
    let status = MessageTarget::of(&status_msg);
    deliver_document(bot, msg.chat.id, DownloadResult::existing(&path), None, Some(&status), &name).await?;
    status.delete(bot).await;
    Ok(())
}

/// Calls the deployment's restart webhook.
pub async fn trigger_restart(url: &str, token: &str) -> AppResult<reqwest::StatusCode> {
    let client = reqwest::Client::builder()
        .timeout(config::network::restart_timeout())
        .build()?;
    let response = client.post(url).bearer_auth(token).send().await?;
    Ok(response.status())
}

/// /restart: asks the hosting platform to redeploy the bot.
async fn handle_restart_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> AppResult<()> {
    let (Some(url), Some(token)) = (deps.config.restart_url.as_deref(), deps.config.coolify_token.as_deref()) else {
        reply_html(bot, msg, "⚠️ RESTART_URL and COOLIFY_TOKEN must be set to restart.").await?;
        return Ok(());
    };

    let status = trigger_restart(url, token).await?;
    if status.is_success() {
        log::warn!("Restart requested by owner in chat {}", msg.chat.id);
        reply_html(bot, msg, "♻️ Restarting...").await?;
    } else {
        log::error!("Restart webhook answered {}", status);
        reply_html(bot, msg, format!("❌ Restart failed: HTTP {}", status.as_u16())).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_owner_commands() {
        assert!(is_owner_command(&Command::Dl));
        assert!(is_owner_command(&Command::Restart));
        assert!(is_owner_command(&Command::Ul("x".into())));
        assert!(!is_owner_command(&Command::Ping));
    }

    #[tokio::test]
    async fn test_restart_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/deploy"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let status = trigger_restart(&format!("{}/api/v1/deploy", server.uri()), "secret")
            .await
            .unwrap();
        assert!(status.is_success());
    }
}
