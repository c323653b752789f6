//! Telegram Bot API integration.
//!
//! API docs: https://core.telegram.org/bots/api
//! Base URL: https://api.telegram.org/bot{token}/{method}
//!
//! Every response is wrapped as `{"ok": bool, "result": ..., "error_code":
//! int, "description": str}`. The bot token is part of the URL, so request
//! URLs are never logged and transport errors are stripped of them.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::Messenger;
use crate::config::TelegramConfig;
use crate::types::{InboundUpdate, NotifyError};

/// Extra time allowed on top of the long-poll timeout before the HTTP
/// request itself gives up.
const LONG_POLL_GRACE_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    chat: RawChat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

impl From<RawUpdate> for InboundUpdate {
    fn from(raw: RawUpdate) -> Self {
        let (chat_id, text) = match raw.message {
            Some(m) => (m.chat.id.to_string(), m.text),
            // Edited messages, channel posts, callback queries: no command.
            None => (String::new(), None),
        };
        InboundUpdate {
            update_id: raw.update_id,
            chat_id,
            text,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct TelegramClient {
    http: Client,
    base_url: String,
    token: SecretString,
}

impl TelegramClient {
    pub fn new(token: SecretString, cfg: &TelegramConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent("COLDSWEEP/0.1.0")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client for Telegram: {e}"))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token.expose_secret())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });

        let resp = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let body = resp.text().await.map_err(transport_error)?;
        parse_response::<serde_json::Value>(&body)?;
        Ok(())
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
        limit: u32,
    ) -> Result<Vec<InboundUpdate>, NotifyError> {
        let mut query = vec![
            ("timeout", timeout_secs.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let resp = self
            .http
            .get(self.method_url("getUpdates"))
            .query(&query)
            .timeout(Duration::from_secs(timeout_secs + LONG_POLL_GRACE_SECS))
            .send()
            .await
            .map_err(transport_error)?;

        let body = resp.text().await.map_err(transport_error)?;
        let raw: Vec<RawUpdate> = parse_response(&body)?;

        debug!(count = raw.len(), offset = ?offset, "Telegram updates fetched");
        Ok(raw.into_iter().map(InboundUpdate::from).collect())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn transport_error(err: reqwest::Error) -> NotifyError {
    NotifyError::Transport(err.without_url().to_string())
}

/// Unwrap the `{"ok": .., "result": ..}` envelope.
fn parse_response<T: DeserializeOwned>(body: &str) -> Result<T, NotifyError> {
    let envelope: ApiResponse<T> =
        serde_json::from_str(body).map_err(|e| NotifyError::Decode(e.to_string()))?;

    if !envelope.ok {
        return Err(NotifyError::Api {
            code: envelope.error_code.unwrap_or_default(),
            description: envelope.description.unwrap_or_default(),
        });
    }

    envelope
        .result
        .ok_or_else(|| NotifyError::Decode("Response missing result".to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
