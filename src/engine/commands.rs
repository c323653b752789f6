//! Inbound command poller.
//!
//! Long-polls the messaging API once per tick and answers `/balance` with
//! the current free balance. The cursor only moves forward, so each update
//! is handled at most once per process lifetime. A failed poll is logged and
//! skipped; it never holds up the sweep that follows it.

use tracing::{debug, info, warn};

use crate::alerts::{notify, Messenger};
use crate::config::CommandsConfig;
use crate::exchanges::ExchangeApi;
use crate::types::{format_amount, Command, InboundUpdate};

pub struct CommandPoller {
    /// Next update id to request; `None` until the first batch arrives.
    cursor: Option<i64>,
    timeout_secs: u64,
    limit: u32,
    operator_chat_id: String,
    operator_only: bool,
}

impl CommandPoller {
    pub fn new(cfg: &CommandsConfig, operator_chat_id: &str) -> Self {
        Self {
            cursor: None,
            timeout_secs: cfg.long_poll_timeout_secs,
            limit: cfg.max_updates,
            operator_chat_id: operator_chat_id.to_string(),
            operator_only: cfg.operator_only,
        }
    }

    pub fn cursor(&self) -> Option<i64> {
        self.cursor
    }

    /// Fetch and answer pending commands. Returns the number of commands
    /// answered.
    pub async fn poll(
        &mut self,
        exchange: &dyn ExchangeApi,
        messenger: &dyn Messenger,
        asset: &str,
    ) -> usize {
        let updates = match messenger
            .get_updates(self.cursor, self.timeout_secs, self.limit)
            .await
        {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, cursor = ?self.cursor, "Failed to fetch inbound commands");
                return 0;
            }
        };

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.cursor = Some(last + 1);
        }

        let mut answered = 0;
        for update in &updates {
            if self.handle(update, exchange, messenger, asset).await {
                answered += 1;
            }
        }
        answered
    }

    async fn handle(
        &self,
        update: &InboundUpdate,
        exchange: &dyn ExchangeApi,
        messenger: &dyn Messenger,
        asset: &str,
    ) -> bool {
        let Some(text) = update.text.as_deref() else {
            return false;
        };

        if self.operator_only && update.chat_id != self.operator_chat_id {
            debug!(
                update_id = update.update_id,
                chat_id = %update.chat_id,
                "Ignoring command from non-operator chat"
            );
            return false;
        }

        match Command::parse(text) {
            Command::Balance => {
                info!(update_id = update.update_id, chat_id = %update.chat_id, "Balance requested");
                let reply = match exchange.free_balance(asset).await {
                    Ok(balance) => format!("Current {asset} balance: {}", format_amount(balance)),
                    Err(e) => {
                        warn!(error = %e, "Balance query failed");
                        format!("Failed to fetch {asset} balance: {e}")
                    }
                };
                notify(messenger, &update.chat_id, &reply).await;
                true
            }
            Command::Unknown => false,
        }
    }
}
