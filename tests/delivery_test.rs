//! Media delivery against a mocked Bot API: retries and temp file cleanup.
//!
//! Run with: cargo test --test delivery_test

mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use teloxide::prelude::*;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, ResponseTemplate};

use common::{bot_message, mount_ok, Harness, CHAT_ID};
use sptube::download::{DownloadResult, MediaSource, TempFile};
use sptube::telegram::delivery::{deliver_audio, deliver_document, deliver_video, AudioMeta};

fn audio_reply() -> serde_json::Value {
    bot_message(
        77,
        json!({ "audio": { "file_id": "audio_id", "file_unique_id": "uid", "duration": 248 } }),
    )
}

fn in_memory(name: &str) -> DownloadResult {
    let mut result = DownloadResult::remote("unused", None);
    result.media = MediaSource::Bytes {
        name: name.to_string(),
        data: b"ID3 not really an mp3".to_vec(),
    };
    result
}

fn meta() -> AudioMeta {
    AudioMeta {
        title: "Get Lucky".to_string(),
        performer: "Daft Punk".to_string(),
        duration: 248,
        caption: "<b>🎵 Get Lucky - 2013</b>".to_string(),
    }
}

#[tokio::test]
async fn test_empty_media_is_retried_once() {
    let test = Harness::new().await;
    Mock::given(method("POST"))
        .and(path_regex("/bot[^/]+/sendAudio"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: MEDIA_EMPTY"
        })))
        .up_to_n_times(1)
        .mount(&test.telegram)
        .await;
    mount_ok(&test.telegram, "sendAudio", audio_reply()).await;

    let sent = deliver_audio(
        &test.bot,
        &test.deps.config,
        ChatId(CHAT_ID),
        &meta(),
        in_memory("get_lucky.ogg"),
        None,
    )
    .await
    .unwrap();

    assert_eq!(sent.id.0, 77);
    let calls = test
        .telegram
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path().ends_with("/sendAudio"))
        .count();
    assert_eq!(calls, 2);
}

#[tokio::test]
async fn test_flood_wait_is_retried_once_then_surfaces() {
    let test = Harness::new().await;
    Mock::given(method("POST"))
        .and(path_regex("/bot[^/]+/sendAudio"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "ok": false,
            "error_code": 429,
            "description": "Too Many Requests: retry after 0",
            "parameters": { "retry_after": 0 }
        })))
        .expect(2)
        .mount(&test.telegram)
        .await;

    let result = deliver_audio(
        &test.bot,
        &test.deps.config,
        ChatId(CHAT_ID),
        &meta(),
        in_memory("get_lucky.ogg"),
        None,
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_other_errors_fail_without_retry() {
    let test = Harness::new().await;
    Mock::given(method("POST"))
        .and(path_regex("/bot[^/]+/sendDocument"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was blocked by the user"
        })))
        .expect(1)
        .mount(&test.telegram)
        .await;

    let result = deliver_document(&test.bot, ChatId(CHAT_ID), in_memory("a.zip"), None, None, "a.zip").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_temp_file_removed_after_upload() {
    let test = Harness::new().await;
    mount_ok(
        &test.telegram,
        "sendVideo",
        bot_message(
            78,
            json!({ "video": { "file_id": "v", "file_unique_id": "u", "width": 1280, "height": 720, "duration": 10 } }),
        ),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    std::fs::write(&path, b"not really a video").unwrap();

    let result = DownloadResult::local(TempFile::new(&path), None);
    deliver_video(&test.bot, ChatId(CHAT_ID), result, Some("<b>clip</b>"), None, "clip.mp4")
        .await
        .unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn test_existing_file_survives_upload() {
    let test = Harness::new().await;
    mount_ok(
        &test.telegram,
        "sendDocument",
        bot_message(79, json!({ "document": { "file_id": "d", "file_unique_id": "u" } })),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"keep me").unwrap();

    deliver_document(&test.bot, ChatId(CHAT_ID), DownloadResult::existing(&path), None, None, "notes.txt")
        .await
        .unwrap();
    assert!(path.exists());
}
