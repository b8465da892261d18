//! Telegram Bot API notifier with Markdown formatting.
//!
//! Delivers messages via the Telegram Bot API `sendMessage` endpoint and
//! answers incoming messages with their chat id, so users know what to put
//! into the `notify` field of a pipe.

use std::time::Duration;

use tokio::sync::watch;

use crate::traits::{Notifier, NotifyError};

const API_BASE: &str = "https://api.telegram.org";

/// Long-poll timeout passed to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Sends messages via the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Creates a new `TelegramNotifier` from a bot token.
    ///
    /// If `bot_token` starts with `${`, the value between `${` and `}` is
    /// resolved as an environment variable name. Returns
    /// [`NotifyError::Config`] if the token is empty or the env var is missing.
    pub fn from_config(bot_token: String) -> Result<Self, NotifyError> {
        let resolved_token = if bot_token.starts_with("${") {
            let var_name = bot_token
                .strip_prefix("${")
                .and_then(|s| s.strip_suffix('}'))
                .ok_or_else(|| {
                    NotifyError::Config(format!("Malformed env var reference: {bot_token}"))
                })?;
            std::env::var(var_name).map_err(|_| {
                NotifyError::Config(format!("Environment variable '{var_name}' is not set"))
            })?
        } else {
            bot_token
        };

        if resolved_token.is_empty() {
            return Err(NotifyError::Config(
                "Telegram bot token must not be empty".to_string(),
            ));
        }

        Ok(Self {
            bot_token: resolved_token,
            api_base: API_BASE.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Point the notifier at another Bot API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    /// Sends a message via the Telegram `sendMessage` API.
    async fn send(&self, chat: &str, text: &str) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "chat_id": chat,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });

        tracing::debug!(chat_id = %chat, "Sending Telegram message");

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let resp_body: serde_json::Value = response.json().await?;

        if resp_body.get("ok") == Some(&serde_json::Value::Bool(true)) {
            tracing::info!(chat_id = %chat, "Telegram message sent");
            return Ok(());
        }

        // Handle rate limiting (HTTP 429).
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp_body
                .get("parameters")
                .and_then(|p| p.get("retry_after"))
                .and_then(|v| v.as_u64())
                .unwrap_or(30);
            return Err(NotifyError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let description = resp_body
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown Telegram API error");

        Err(NotifyError::Rejected(format!(
            "Telegram API error: {description}"
        )))
    }

    /// Returns the channel name for this notifier.
    fn channel_name(&self) -> &str {
        "telegram"
    }
}

/// Extract chat ids and the next offset from a `getUpdates` response.
///
/// Updates without a message (edits, callbacks) still advance the offset.
pub fn chat_ids(updates: &serde_json::Value) -> (Vec<i64>, Option<i64>) {
    let mut chats = Vec::new();
    let mut next = None;
    let list = updates
        .get("result")
        .and_then(|r| r.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    for update in list {
        if let Some(id) = update.get("update_id").and_then(|v| v.as_i64()) {
            next = Some(next.map_or(id + 1, |n: i64| n.max(id + 1)));
        }
        if let Some(chat) = update
            .get("message")
            .and_then(|m| m.get("chat"))
            .and_then(|c| c.get("id"))
            .and_then(|v| v.as_i64())
        {
            chats.push(chat);
        }
    }
    (chats, next)
}

/// Answers every message sent to the bot with "Your chat ID is N".
pub struct ChatIdResponder {
    notifier: TelegramNotifier,
}

impl ChatIdResponder {
    pub fn new(notifier: TelegramNotifier) -> Self {
        Self { notifier }
    }

    /// Poll for updates until `shutdown` flips to `true`.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Telegram chat-id responder started");
        let mut offset: Option<i64> = None;
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                polled = self.poll(offset) => match polled {
                    Ok(next) => {
                        if next.is_some() {
                            offset = next;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Telegram getUpdates failed");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Telegram chat-id responder stopped");
    }

    async fn poll(&self, offset: Option<i64>) -> Result<Option<i64>, NotifyError> {
        let mut query = vec![("timeout", POLL_TIMEOUT_SECS.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }
        let updates: serde_json::Value = self
            .notifier
            .client
            .get(self.notifier.method_url("getUpdates"))
            .query(&query)
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .send()
            .await?
            .json()
            .await?;
        let (chats, next) = chat_ids(&updates);
        for chat in chats {
            let chat = chat.to_string();
            let text = format!("Your chat ID is {chat}");
            if let Err(e) = self.notifier.send(&chat, &text).await {
                tracing::warn!(chat_id = %chat, error = %e, "failed to answer chat");
            }
        }
        Ok(next)
    }
}
