//! Shared harness for integration tests.
//!
//! Two wiremock servers stand in for the outside world: one plays the Telegram Bot
//! API (the bot is pointed at it with `set_api_url`), the other plays the track
//! provider. Telegram objects are built from JSON, the same shape the Bot API sends.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};
use tempfile::TempDir;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sptube::core::Config;
use sptube::download::Downloader;
use sptube::provider::ProviderClient;
use sptube::telegram::HandlerDeps;

pub const BOT_ID: u64 = 987654321;
pub const CHAT_ID: i64 = 123456789;
pub const USER_ID: u64 = 555000111;

pub struct Harness {
    pub telegram: MockServer,
    pub provider: MockServer,
    pub bot: Bot,
    pub deps: HandlerDeps,
    pub downloads: TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        let telegram = MockServer::start().await;
        let provider = MockServer::start().await;
        let downloads = TempDir::new().expect("temp dir");

        let bot = Bot::new("test_token_12345:ABCDEF").set_api_url(telegram.uri().parse().unwrap());
        let config = test_config(&provider.uri(), downloads.path());
        let client = ProviderClient::from_config(&config).expect("provider client");
        let downloader = Downloader::new(Arc::clone(&config), client).unwrap();
        let deps = HandlerDeps::with_identity(config, downloader, "test_bot", UserId(BOT_ID));

        Self {
            telegram,
            provider,
            bot,
            deps,
            downloads,
        }
    }

    /// Answers every Bot API method with a plausible success.
    pub async fn mock_all_telegram_api(&self) {
        for name in ["answerCallbackQuery", "deleteMessage", "setMyCommands"] {
            mount_ok(&self.telegram, name, json!(true)).await;
        }
        for name in ["sendMessage", "editMessageText", "editMessageReplyMarkup"] {
            mount_ok(&self.telegram, name, bot_message(42, json!({ "text": "Response" }))).await;
        }
    }

    /// JSON bodies of every request made to the Bot API `method`.
    pub async fn requests_to(&self, api_method: &str) -> Vec<Value> {
        self.telegram
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path().ends_with(&format!("/{}", api_method)))
            .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
            .collect()
    }
}

pub fn test_config(api_url: &str, download_dir: &Path) -> Arc<Config> {
    let download_dir = download_dir.display().to_string();
    let config = Config::from_lookup(|key| match key {
        "TOKEN" => Some("test_token_12345:ABCDEF".to_string()),
        "API_KEY" => Some("test-key".to_string()),
        "API_URL" => Some(api_url.to_string()),
        "DOWNLOAD_PATH" => Some(download_dir.clone()),
        "OWNER_ID" => Some("1".to_string()),
        _ => None,
    })
    .expect("test config");
    Arc::new(config)
}

/// Mounts a successful answer for one Bot API method.
pub async fn mount_ok(server: &MockServer, api_method: &str, result: Value) {
    Mock::given(method("POST"))
        .and(path_regex(format!("/bot[^/]+/{}", api_method)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": result })))
        .mount(server)
        .await;
}

/// A message sent by the bot, with `extra` fields merged in.
pub fn bot_message(message_id: i32, extra: Value) -> Value {
    let mut message = json!({
        "message_id": message_id,
        "from": { "id": BOT_ID, "is_bot": true, "first_name": "TestBot", "username": "test_bot" },
        "chat": { "id": CHAT_ID, "type": "private", "first_name": "Test" },
        "date": 1735992000
    });
    if let (Some(target), Value::Object(extra)) = (message.as_object_mut(), extra) {
        target.extend(extra);
    }
    message
}

/// Create a Message from JSON (more reliable than struct construction)
pub fn message_from_json(text: &str, user_id: u64) -> Message {
    let json = json!({
        "message_id": 1,
        "date": 1735992000,
        "chat": { "id": CHAT_ID, "type": "private", "first_name": "Test", "username": "testuser" },
        "from": { "id": user_id, "is_bot": false, "first_name": "Test", "username": "testuser" },
        "text": text
    });
    serde_json::from_value(json).expect("Failed to deserialize message")
}

/// Create a CallbackQuery pressed on a bot keyboard message
pub fn callback_from_json(data: &str, user_id: u64) -> CallbackQuery {
    let json = json!({
        "id": "callback_123",
        "from": { "id": user_id, "is_bot": false, "first_name": "Test", "username": "testuser" },
        "message": bot_message(42, json!({ "text": "Select a track" })),
        "chat_instance": "chat_instance_123",
        "data": data
    });
    serde_json::from_value(json).expect("Failed to deserialize callback")
}

/// A provider search entry.
pub fn track_json(id: &str, name: &str, artist: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "artist": artist,
        "url": format!("https://open.spotify.com/track/{}", id),
        "year": "2013",
        "duration": 248,
        "cover": "https://i.scdn.co/image/cover",
        "cover_small": "https://i.scdn.co/image/cover_small",
        "platform": "spotify"
    })
}
