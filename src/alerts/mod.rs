//! Operator messaging.
//!
//! Defines the `Messenger` trait (outbound notifications plus inbound
//! command polling) and the Telegram implementation. Notifications are
//! best-effort: a failed send is logged and never retried or escalated.

pub mod telegram;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::types::{InboundUpdate, NotifyError};

/// Abstraction over a chat-bot style messaging API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a plain-text message to `chat_id`.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError>;

    /// Long-poll for inbound messages with ids `>= offset`.
    ///
    /// Blocks for at most `timeout_secs` (plus transport overhead) and
    /// returns at most `limit` updates.
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
        limit: u32,
    ) -> Result<Vec<InboundUpdate>, NotifyError>;
}

/// Send a notification, logging (and swallowing) any failure.
///
/// Returns whether the message was delivered.
pub async fn notify(messenger: &dyn Messenger, chat_id: &str, text: &str) -> bool {
    match messenger.send_message(chat_id, text).await {
        Ok(()) => {
            debug!(chat_id, "Notification sent");
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to send Telegram notification");
            false
        }
    }
}
