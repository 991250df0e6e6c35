//! Sending downloaded media back to Telegram.
//!
//! Every upload goes through [`send_with_retry`]: an empty-media answer is retried
//! once after a short pause, a flood wait is retried once after the server-given
//! delay, anything else fails immediately. Local files are wrapped in a
//! [`ProgressReader`] so the status message can show upload progress, and the
//! [`DownloadResult`] is consumed, which removes its temp files on every exit path.

use std::future::Future;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, FileId, InputFile, InputMedia, InputMediaAudio, MessageId, ParseMode, Recipient,
};
use teloxide::RequestError;

use super::markup;
use super::status::{spawn_ticker, MessageTarget};
use crate::core::config::{self, Config};
use crate::core::error::{AppError, AppResult};
use crate::download::{parse_internal_link, DownloadResult, MediaSource, Progress, ProgressReader};

/// `MEDIA_EMPTY` as a whole token, so `WEBPAGE_MEDIA_EMPTY` stays curl-class.
static EMPTY_MEDIA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bMEDIA_EMPTY\b").expect("empty media regex"));

const CURL_FAILED_MARKERS: &[&str] = &[
    "WEBPAGE_CURL_FAILED",
    "WEBPAGE_MEDIA_EMPTY",
    "failed to get HTTP URL content",
    "wrong file identifier/HTTP URL specified",
    "wrong type of the web page content",
];

fn contains_marker(err: &RequestError, markers: &[&str]) -> bool {
    let text = err.to_string().to_lowercase();
    markers.iter().any(|m| text.contains(&m.to_lowercase()))
}

/// Telegram accepted the request but got no media bytes; usually transient.
pub fn is_empty_media(err: &RequestError) -> bool {
    EMPTY_MEDIA_RE.is_match(&err.to_string())
}

/// Telegram could not fetch a file by URL; the caller should upload it itself.
pub fn is_curl_failed(err: &RequestError) -> bool {
    contains_marker(err, CURL_FAILED_MARKERS)
}

/// Runs `send`, retrying exactly once on an empty-media or flood-wait error.
pub async fn send_with_retry<T, F, Fut>(what: &str, send: F) -> Result<T, RequestError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let err = match send().await {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    match &err {
        RequestError::RetryAfter(wait) => {
            log::warn!("Flood wait while sending {}: retrying in {:?}", what, wait.duration());
            tokio::time::sleep(wait.duration()).await;
        }
        e if is_empty_media(e) => {
            log::warn!("Empty media while sending {}: retrying once", what);
            tokio::time::sleep(config::retry::empty_media_delay()).await;
        }
        e => {
            log::error!("Sending {} failed: {}", what, e);
            return Err(err);
        }
    }

    send().await.inspect_err(|e| log::error!("Retry of {} failed: {}", what, e))
}

/// Opens a local file as an upload that counts bytes into `progress`.
pub async fn input_file_with_progress(path: &Path, progress: Progress) -> Result<InputFile, RequestError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| RequestError::Io(std::sync::Arc::new(e)))?;
    if let Ok(meta) = file.metadata().await {
        progress.set_total(meta.len());
    }
    let mut input = InputFile::read(ProgressReader::new(file, progress));
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        input = input.file_name(name.to_string());
    }
    Ok(input)
}

/// Builds the upload for a local or in-memory source.
///
/// Remote references must be resolved with [`resolve_remote`] first.
async fn input_for(source: &MediaSource, progress: &Progress) -> Result<InputFile, RequestError> {
    match source {
        MediaSource::LocalPath(path) => input_file_with_progress(path, progress.clone()).await,
        other => Ok(plain_input(other)),
    }
}

/// Upload for `source` without progress reporting.
pub fn plain_input(source: &MediaSource) -> InputFile {
    match source {
        MediaSource::LocalPath(path) => InputFile::file(path.clone()),
        MediaSource::Bytes { name, data } => InputFile::memory(data.clone()).file_name(name.clone()),
        MediaSource::RemoteRef(file_id) => InputFile::file_id(FileId(file_id.clone())),
    }
}

/// File id of whatever media `msg` carries.
pub fn media_file_id(msg: &Message) -> Option<FileId> {
    msg.audio()
        .map(|a| a.file.id.clone())
        .or_else(|| msg.document().map(|d| d.file.id.clone()))
        .or_else(|| msg.video().map(|v| v.file.id.clone()))
        .or_else(|| msg.voice().map(|v| v.file.id.clone()))
        .or_else(|| msg.animation().map(|a| a.file.id.clone()))
}

/// Turns an internal `t.me/<channel>/<id>` link into a file id.
///
/// The message is forwarded into `scratch_chat` to learn its file id; the forward
/// is deleted again right away.
pub async fn resolve_remote(bot: &Bot, link: &str, scratch_chat: ChatId) -> AppResult<FileId> {
    let internal = parse_internal_link(link).ok_or_else(|| AppError::Validation(format!("not a chat link: {}", link)))?;
    let from = Recipient::ChannelUsername(format!("@{}", internal.channel));
    let forwarded = bot
        .forward_message(scratch_chat, from, MessageId(internal.message_id))
        .await?;
    let file_id = media_file_id(&forwarded);
    if let Err(e) = bot.delete_message(scratch_chat, forwarded.id).await {
        log::debug!("Failed to delete forwarded message: {}", e);
    }
    file_id.ok_or_else(|| AppError::Validation(format!("{} has no media", link)))
}

/// Metadata attached to an audio upload.
#[derive(Debug, Clone, Default)]
pub struct AudioMeta {
    pub title: String,
    pub performer: String,
    pub duration: u32,
    pub caption: String,
}

impl AudioMeta {
    pub fn from_track(track: &crate::provider::TrackDetail) -> Self {
        Self {
            title: track.name.clone(),
            performer: track.artist.clone(),
            duration: track.duration,
            caption: markup::detail_caption(track),
        }
    }
}

/// Sends `result` as an audio message to `chat_id`.
///
/// `status` receives upload progress while a local file is sent.
pub async fn deliver_audio(
    bot: &Bot,
    config: &Config,
    chat_id: ChatId,
    meta: &AudioMeta,
    mut result: DownloadResult,
    status: Option<&MessageTarget>,
) -> AppResult<Message> {
    if let MediaSource::RemoteRef(link) = &result.media {
        let scratch = config.logger_id.map(ChatId).unwrap_or(chat_id);
        let file_id = resolve_remote(bot, link, scratch).await?;
        result.media = MediaSource::RemoteRef(file_id.0);
    }

    let progress = Progress::new();
    let ticker = match (status, &result.media) {
        (Some(target), MediaSource::LocalPath(_)) => Some(spawn_ticker(
            bot.clone(),
            target.clone(),
            progress.clone(),
            "Uploading",
            &meta.title,
            config::progress::upload_tick(),
        )),
        _ => None,
    };

    let media = &result.media;
    let thumbnail = result.thumbnail.as_deref();
    let progress = &progress;
    let keyboard = markup::branded_keyboard(&meta.title);
    let keyboard = &keyboard;
    let sent = send_with_retry("audio", move || async move {
        let file = input_for(media, progress).await?;
        let mut request = bot
            .send_audio(chat_id, file)
            .caption(meta.caption.clone())
            .parse_mode(ParseMode::Html)
            .title(meta.title.clone())
            .performer(meta.performer.clone())
            .reply_markup(keyboard.clone());
        if meta.duration > 0 {
            request = request.duration(meta.duration);
        }
        if let Some(thumb) = thumbnail {
            request = request.thumbnail(InputFile::memory(thumb.to_vec()).file_name("cover.jpg"));
        }
        request.await
    })
    .await;

    if let Some(ticker) = ticker {
        ticker.abort();
    }
    drop(result);
    Ok(sent?)
}

/// Sends `result` as a video with an optional HTML caption.
pub async fn deliver_video(
    bot: &Bot,
    chat_id: ChatId,
    result: DownloadResult,
    caption: Option<&str>,
    status: Option<&MessageTarget>,
    name: &str,
) -> AppResult<Message> {
    let progress = Progress::new();
    let ticker = status.map(|target| {
        spawn_ticker(
            bot.clone(),
            target.clone(),
            progress.clone(),
            "Uploading",
            name,
            config::progress::upload_tick(),
        )
    });

    let media = &result.media;
    let progress = &progress;
    let sent = send_with_retry("video", move || async move {
        let file = input_for(media, progress).await?;
        let mut request = bot.send_video(chat_id, file).supports_streaming(true);
        if let Some(caption) = caption {
            request = request.caption(caption.to_string()).parse_mode(ParseMode::Html);
        }
        request.await
    })
    .await;

    if let Some(ticker) = ticker {
        ticker.abort();
    }
    drop(result);
    Ok(sent?)
}

/// Sends `result` as a document.
pub async fn deliver_document(
    bot: &Bot,
    chat_id: ChatId,
    result: DownloadResult,
    caption: Option<&str>,
    status: Option<&MessageTarget>,
    name: &str,
) -> AppResult<Message> {
    let progress = Progress::new();
    let ticker = status.map(|target| {
        spawn_ticker(
            bot.clone(),
            target.clone(),
            progress.clone(),
            "Uploading",
            name,
            config::progress::upload_tick(),
        )
    });

    let media = &result.media;
    let progress = &progress;
    let sent = send_with_retry("document", move || async move {
        let file = input_for(media, progress).await?;
        let mut request = bot.send_document(chat_id, file);
        if let Some(caption) = caption {
            request = request.caption(caption.to_string()).parse_mode(ParseMode::Html);
        }
        request.await
    })
    .await;

    if let Some(ticker) = ticker {
        ticker.abort();
    }
    drop(result);
    Ok(sent?)
}

/// Replaces an inline result's placeholder with the audio.
///
/// Inline messages cannot receive uploads, so the file is first sent to the dump
/// chat (`LOGGER_ID`, or the user's own chat) to obtain a file id.
pub async fn deliver_inline_audio(
    bot: &Bot,
    config: &Config,
    inline_message_id: &str,
    user_chat: ChatId,
    meta: &AudioMeta,
    result: DownloadResult,
) -> AppResult<()> {
    let dump_chat = config.logger_id.map(ChatId).unwrap_or(user_chat);
    let uploaded = deliver_audio(bot, config, dump_chat, meta, result, None).await?;
    let file_id = media_file_id(&uploaded)
        .ok_or_else(|| AppError::Validation("uploaded message has no audio".to_string()))?;

    if config.logger_id.is_none() {
        if let Err(e) = bot.delete_message(uploaded.chat.id, uploaded.id).await {
            log::debug!("Failed to delete scratch upload: {}", e);
        }
    }

    let audio = InputMediaAudio::new(InputFile::file_id(file_id))
        .caption(meta.caption.clone())
        .parse_mode(ParseMode::Html)
        .title(meta.title.clone())
        .performer(meta.performer.clone());
    let keyboard = markup::branded_keyboard(&meta.title);
    let (audio, keyboard) = (&audio, &keyboard);
    send_with_retry("inline audio", move || async move {
        bot.edit_message_media_inline(inline_message_id.to_string(), InputMedia::Audio(audio.clone()))
            .reply_markup(keyboard.clone())
            .await
    })
    .await?;
    Ok(())
}
