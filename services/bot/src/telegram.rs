//! Minimal Telegram Bot API client.
//!
//! Covers only the calls this service needs: long-polled getUpdates, text
//! replies, chart uploads, and the typing indicator. Everything else the
//! Bot API offers is out of scope.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::multipart;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// "private", "group", "supergroup", or "channel".
    #[serde(default, rename = "type")]
    pub kind: String,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

/// The bot's own identity, from getMe.
#[derive(Debug, Clone, Deserialize)]
pub struct BotProfile {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// Envelope every Bot API method returns.
#[derive(Debug, Deserialize)]
struct ApiReply<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, poll_timeout_secs: u64) -> Result<Self> {
        // The request timeout must outlast the long poll itself.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 30))
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            poll_timeout_secs,
        })
    }

    /// Who am I? Used to strip `@BotName` suffixes and gate group replies.
    pub async fn get_me(&self) -> Result<BotProfile> {
        let reply = self
            .http
            .get(format!("{}/getMe", self.base_url))
            .send()
            .await
            .context("getMe request failed")?
            .json::<ApiReply<BotProfile>>()
            .await
            .context("getMe reply was not valid JSON")?;

        unwrap_reply(reply, "getMe")
    }

    /// Long-poll for updates with ids >= `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let reply = self
            .http
            .get(format!("{}/getUpdates", self.base_url))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.poll_timeout_secs.to_string()),
                ("allowed_updates", "[\"message\"]".to_string()),
            ])
            .send()
            .await
            .context("getUpdates request failed")?
            .json::<ApiReply<Vec<Update>>>()
            .await
            .context("getUpdates reply was not valid JSON")?;

        unwrap_reply(reply, "getUpdates")
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let reply = self
            .http
            .post(format!("{}/sendMessage", self.base_url))
            .form(&[("chat_id", chat_id.to_string()), ("text", text.to_string())])
            .send()
            .await
            .context("sendMessage request failed")?
            .json::<ApiReply<Message>>()
            .await
            .context("sendMessage reply was not valid JSON")?;

        unwrap_reply(reply, "sendMessage").map(|_| ())
    }

    /// Upload a PNG chart with a caption.
    pub async fn send_photo(
        &self,
        chat_id: i64,
        png: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> Result<()> {
        let part = multipart::Part::bytes(png)
            .file_name(filename.to_string())
            .mime_str("image/png")
            .context("Failed to build photo part")?;
        let form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);

        let reply = self
            .http
            .post(format!("{}/sendPhoto", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("sendPhoto request failed")?
            .json::<ApiReply<Message>>()
            .await
            .context("sendPhoto reply was not valid JSON")?;

        unwrap_reply(reply, "sendPhoto").map(|_| ())
    }

    /// Best-effort activity indicator; failures are logged and swallowed.
    pub async fn send_chat_action(&self, chat_id: i64, action: &str) {
        let result = self
            .http
            .post(format!("{}/sendChatAction", self.base_url))
            .form(&[
                ("chat_id", chat_id.to_string()),
                ("action", action.to_string()),
            ])
            .send()
            .await;

        if let Err(e) = result {
            debug!(error = %e, "sendChatAction failed");
        }
    }
}

fn unwrap_reply<T>(reply: ApiReply<T>, method: &str) -> Result<T> {
    if !reply.ok {
        let detail = reply
            .description
            .unwrap_or_else(|| "no description".to_string());
        return Err(anyhow!("Telegram {} failed: {}", method, detail));
    }
    reply
        .result
        .ok_or_else(|| anyhow!("Telegram {} returned ok without a result", method))
}
