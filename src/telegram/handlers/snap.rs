//! Social media posts: Instagram, Pinterest and Facebook.
//!
//! Media is first sent by URL so Telegram fetches it directly. When Telegram cannot
//! reach the file, it is downloaded here and uploaded instead.

use futures_util::future::join_all;
use teloxide::prelude::*;
use teloxide::types::{
    InputFile, InputMedia, InputMediaPhoto, InputMediaVideo, ReplyParameters,
};
use teloxide::RequestError;

use super::messages::reply_html;
use super::types::HandlerDeps;
use crate::core::config::{self, limits};
use crate::core::error::AppResult;
use crate::download::probe::has_audio_stream;
use crate::download::{DownloadResult, Progress};
use crate::provider::ProviderError;
use crate::telegram::delivery::{deliver_video, is_curl_failed, is_empty_media, plain_input, send_with_retry};
use crate::telegram::status::{spawn_ticker, MessageTarget};

/// Fetches the post behind `link` and sends every image and video in it.
pub async fn handle_snap(bot: &Bot, msg: &Message, deps: &HandlerDeps, link: &str) -> AppResult<()> {
    log::info!("Snap request for {} in chat {}", link, msg.chat.id);
    let snap = match deps.provider().snap(link).await {
        Ok(snap) => snap,
        Err(ProviderError::NotFound(_)) => {
            log::warn!("No media found for {}", link);
            reply_html(bot, msg, "😔 No media found for this link.").await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let sender = SnapSender { bot, msg, deps };
    for batch in snap.image.chunks(limits::ALBUM_BATCH_SIZE) {
        sender.send_images(batch).await?;
    }

    let videos = snap.video_urls();
    match videos.as_slice() {
        [] => {}
        [single] => sender.send_single_video(single).await?,
        many => sender.send_many_videos(many).await?,
    }
    Ok(())
}

struct SnapSender<'a> {
    bot: &'a Bot,
    msg: &'a Message,
    deps: &'a HandlerDeps,
}

impl SnapSender<'_> {
    fn reply_to(&self) -> ReplyParameters {
        ReplyParameters::new(self.msg.id).allow_sending_without_reply()
    }

    async fn send_images(&self, batch: &[String]) -> AppResult<()> {
        if let [single] = batch {
            let url = &reqwest::Url::parse(single)?;
            let sent = send_with_retry("photo", move || async move {
                self.bot
                    .send_photo(self.msg.chat.id, InputFile::url(url.clone()))
                    .reply_parameters(self.reply_to())
                    .await
            })
            .await;
            return match sent {
                Ok(_) => Ok(()),
                Err(e) if is_curl_failed(&e) => {
                    log::warn!("Telegram could not fetch image, uploading it: {}", e);
                    let image = self.deps.downloader.fetch_image(single, "image").await?;
                    self.send_fetched_photos(std::slice::from_ref(&image)).await
                }
                Err(e) => Err(e.into()),
            };
        }

        let media = batch
            .iter()
            .map(|u| Ok(InputMedia::Photo(InputMediaPhoto::new(InputFile::url(reqwest::Url::parse(u)?)))))
            .collect::<Result<Vec<_>, url::ParseError>>()?;
        match self.send_group("album", media).await {
            Ok(()) => Ok(()),
            Err(e) if is_curl_failed(&e) || is_empty_media(&e) => {
                log::warn!("Album by URL failed, uploading {} images: {}", batch.len(), e);
                let mut images = Vec::with_capacity(batch.len());
                for url in batch {
                    match self.deps.downloader.fetch_image(url, "image").await {
                        Ok(image) => images.push(image),
                        Err(e) => log::warn!("Skipping image {}: {}", url, e),
                    }
                }
                self.send_fetched_photos(&images).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Uploads images fetched by the bot itself.
    async fn send_fetched_photos(&self, images: &[DownloadResult]) -> AppResult<()> {
        match images {
            [] => Ok(()),
            [image] => {
                let media = &image.media;
                send_with_retry("photo", move || async move {
                    self.bot
                        .send_photo(self.msg.chat.id, plain_input(media))
                        .reply_parameters(self.reply_to())
                        .await
                })
                .await?;
                Ok(())
            }
            many => {
                let media = many
                    .iter()
                    .map(|r| InputMedia::Photo(InputMediaPhoto::new(plain_input(&r.media))))
                    .collect();
                self.send_group("album", media).await?;
                Ok(())
            }
        }
    }

    async fn send_group(&self, what: &str, media: Vec<InputMedia>) -> Result<(), RequestError> {
        let media = &media;
        send_with_retry(what, move || async move {
            self.bot
                .send_media_group(self.msg.chat.id, media.clone())
                .reply_parameters(self.reply_to())
                .await
        })
        .await
        .map(|_| ())
    }

    async fn send_video_url(&self, url: &reqwest::Url) -> Result<(), RequestError> {
        send_with_retry("video", move || async move {
            self.bot
                .send_video(self.msg.chat.id, InputFile::url(url.clone()))
                .supports_streaming(true)
                .reply_parameters(self.reply_to())
                .await
        })
        .await
        .map(|_| ())
    }

    async fn send_single_video(&self, url: &str) -> AppResult<()> {
        let parsed = reqwest::Url::parse(url)?;
        let err = match self.send_video_url(&parsed).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if !is_curl_failed(&err) {
            return Err(err.into());
        }
        log::warn!("Telegram could not fetch video, uploading it: {}", err);

        let status_msg = reply_html(self.bot, self.msg, "⏬ Downloading...").await?;
        let status = MessageTarget::of(&status_msg);
        let progress = Progress::new();
        let ticker = spawn_ticker(
            self.bot.clone(),
            status.clone(),
            progress.clone(),
            "Downloading",
            "video",
            config::progress::download_tick(),
        );
        let downloaded = self.deps.downloader.fetch_url(url, "video", "mp4", &progress).await;
        ticker.abort();

        let result = match downloaded {
            Ok(result) => result,
            Err(e) => {
                status.set_text(self.bot, format!("❌ Download failed: {}", e)).await;
                return Err(e.into());
            }
        };
        deliver_video(self.bot, self.msg.chat.id, result, None, Some(&status), "video").await?;
        status.delete(self.bot).await;
        Ok(())
    }

    /// Videos with sound go out as videos (albums of up to 10); silent clips as animations.
    async fn send_many_videos(&self, urls: &[String]) -> AppResult<()> {
        let ffprobe = &self.deps.config.ffprobe_bin;
        let probes = join_all(urls.iter().map(|u| has_audio_stream(ffprobe, u))).await;
        let (with_audio, silent): (Vec<_>, Vec<_>) = urls.iter().zip(probes).partition(|(_, audio)| *audio);
        log::info!("{} videos with audio, {} silent", with_audio.len(), silent.len());

        let with_audio: Vec<&String> = with_audio.into_iter().map(|(u, _)| u).collect();
        for batch in with_audio.chunks(limits::ALBUM_BATCH_SIZE) {
            match batch {
                [single] => self.send_video_url(&reqwest::Url::parse(single)?).await?,
                many => {
                    let media = many
                        .iter()
                        .map(|u| Ok(InputMedia::Video(InputMediaVideo::new(InputFile::url(reqwest::Url::parse(u)?)))))
                        .collect::<Result<Vec<_>, url::ParseError>>()?;
                    self.send_group("video album", media).await?;
                }
            }
        }

        // Animations cannot be grouped into albums
        for (url, _) in silent {
            let url = reqwest::Url::parse(url)?;
            let url = &url;
            send_with_retry("animation", move || async move {
                self.bot
                    .send_animation(self.msg.chat.id, InputFile::url(url.clone()))
                    .reply_parameters(self.reply_to())
                    .await
            })
            .await?;
        }
        Ok(())
    }
}
