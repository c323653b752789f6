//! Shared types for the COLDSWEEP agent.
//!
//! These types form the data model used across all modules: exchange
//! metadata, withdrawal requests, inbound bot commands, sweep policies and
//! the error taxonomy. Client and engine modules depend on them without
//! depending on each other.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places used for every amount sent to or reported from the
/// exchange (satoshi precision).
pub const AMOUNT_DECIMALS: u32 = 8;

/// Format an amount with exactly eight decimal places.
///
/// Digits beyond the eighth are truncated toward zero, so a formatted
/// withdrawal amount never exceeds the value it was computed from.
pub fn format_amount(value: Decimal) -> String {
    let truncated = value.round_dp_with_strategy(AMOUNT_DECIMALS, RoundingStrategy::ToZero);
    format!("{truncated:.8}")
}

// ---------------------------------------------------------------------------
// Exchange data
// ---------------------------------------------------------------------------

/// Withdrawal metadata for a single asset as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub asset: String,
    /// Network fee deducted by the exchange per withdrawal.
    pub withdraw_fee: Decimal,
    /// Exchange-enforced floor for a single withdrawal.
    pub min_withdraw_amount: Decimal,
    /// False while the exchange has withdrawals for this asset suspended.
    pub withdraw_enabled: bool,
}

/// A withdrawal to be submitted to the exchange. Constructed per qualifying
/// tick and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub coin: String,
    pub address: String,
    /// Amount formatted with [`AMOUNT_DECIMALS`] places.
    pub amount: String,
    pub network: String,
    /// Client-side identifier (Binance `withdrawOrderId`) for tracing the
    /// withdrawal in the exchange history.
    pub client_id: String,
}

impl WithdrawalRequest {
    pub fn new(coin: &str, address: &str, amount: Decimal, network: &str) -> Self {
        Self {
            coin: coin.to_string(),
            address: address.to_string(),
            amount: format_amount(amount),
            network: network.to_string(),
            client_id: uuid::Uuid::new_v4().simple().to_string(),
        }
    }
}

impl fmt::Display for WithdrawalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Address={}, Amount={}, Network={}",
            self.address, self.amount, self.network
        )
    }
}

/// Exchange acknowledgement of a submitted withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    /// Exchange-assigned withdrawal id.
    pub id: String,
    pub request: WithdrawalRequest,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Inbound commands
// ---------------------------------------------------------------------------

/// A single inbound message fetched from the messaging API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    /// Monotonic identifier used as the long-poll cursor.
    pub update_id: i64,
    /// Origin chat; replies go back here.
    pub chat_id: String,
    /// Message text. `None` for stickers, photos, joins and so on.
    pub text: Option<String>,
}

/// Commands understood by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/balance`: reply with the current free balance.
    Balance,
    Unknown,
}

impl Command {
    /// Parse message text into a command. Accepts the `/cmd@botname` form
    /// Telegram uses in group chats.
    pub fn parse(text: &str) -> Self {
        let word = text.split_whitespace().next().unwrap_or_default();
        let name = word.split('@').next().unwrap_or_default();
        match name {
            "/balance" => Command::Balance,
            _ => Command::Unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// Sweep policies
// ---------------------------------------------------------------------------

/// What the agent does after a policy-abort (post-fee amount below minimum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsufficientNetPolicy {
    /// Notify the operator and terminate the process.
    #[default]
    Exit,
    /// Notify the operator and keep polling.
    Continue,
}

/// How the "net amount deposited" figure in success notifications is
/// computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetReporting {
    /// The requested withdrawal amount. The exchange deducts the fee from
    /// the balance, not from the amount received.
    #[default]
    Exact,
    /// Withdrawal amount minus the fee a second time.
    DoubleFee,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors surfaced by exchange clients.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExchangeError {
    /// The exchange understood the request and refused it (bad parameters,
    /// insufficient balance, address not whitelisted, ...).
    #[error("Exchange rejected request (status {status}, code {code}): {message}")]
    Rejected {
        status: u16,
        code: i64,
        message: String,
    },

    /// Timeouts, connection failures, rate limiting and 5xx responses.
    #[error("Transient exchange failure: {0}")]
    Transient(String),

    #[error("Exchange request failed: {0}")]
    Unknown(String),
}

/// Errors surfaced by messaging clients.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotifyError {
    #[error("Messaging transport error: {0}")]
    Transport(String),

    #[error("Messaging API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Failed to decode messaging response: {0}")]
    Decode(String),
}

/// Closed taxonomy of failures that can end a sweep tick.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SweepError {
    /// Required exchange metadata was unavailable before the loop started.
    #[error("Startup failed: {0}")]
    StartupFatal(String),

    /// Post-fee withdrawal amount fell below the exchange minimum.
    #[error(
        "Withdrawal amount ({amount:.8}) is less than the minimum withdrawal amount ({minimum:.8})."
    )]
    InsufficientNet { amount: Decimal, minimum: Decimal },

    /// The exchange refused a submitted withdrawal.
    #[error("{reason}. Parameters: {request}")]
    WithdrawalRejected {
        request: WithdrawalRequest,
        reason: String,
    },

    #[error("Read timeout occurred: {0}")]
    Transient(String),

    /// Any other exchange failure.
    #[error("A request exception occurred: {0}")]
    Exchange(String),

    #[error("Notification failed: {0}")]
    Notification(#[from] NotifyError),
}

impl From<ExchangeError> for SweepError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Transient(msg) => SweepError::Transient(msg),
            other @ (ExchangeError::Rejected { .. } | ExchangeError::Unknown(_)) => {
                SweepError::Exchange(other.to_string())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
