//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! field has a default, so a missing file yields a working configuration.
//! Secrets (API keys, bot token, destination address) are referenced by
//! env-var name in the config and resolved once at startup.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::types::{InsufficientNetPolicy, NetReporting};

/// Telegram caps `getUpdates` batches at 100.
const MAX_UPDATES_LIMIT: u32 = 100;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub sweeper: SweeperConfig,
    pub exchange: ExchangeConfig,
    pub telegram: TelegramConfig,
    pub commands: CommandsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SweeperConfig {
    /// Asset to sweep.
    pub asset: String,
    /// Sleep between ticks.
    pub poll_interval_secs: u64,
    /// Env var holding the cold-storage destination address.
    pub address_env: String,
    /// Network label override. When unset the label is derived from the
    /// destination address.
    pub network: Option<String>,
    pub on_insufficient_net: InsufficientNetPolicy,
    pub net_reporting: NetReporting,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            asset: "BTC".to_string(),
            poll_interval_secs: 1800,
            address_env: "LEDGER_BTC_ADDRESS".to_string(),
            network: None,
            on_insufficient_net: InsufficientNetPolicy::default(),
            net_reporting: NetReporting::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub api_secret_env: String,
    pub timeout_secs: u64,
    /// Binance `recvWindow` for signed requests.
    pub recv_window_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".to_string(),
            api_key_env: "BINANCE_API_KEY".to_string(),
            api_secret_env: "BINANCE_API_SECRET".to_string(),
            timeout_secs: 20,
            recv_window_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelegramConfig {
    pub base_url: String,
    pub bot_token_env: String,
    /// Env var holding the operator chat id. Notifications go here.
    pub chat_id_env: String,
    /// Timeout for `sendMessage` calls.
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.telegram.org".to_string(),
            bot_token_env: "TELEGRAM_BOT_TOKEN".to_string(),
            chat_id_env: "TELEGRAM_CHAT_ID".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommandsConfig {
    /// Poll the bot for `/balance` commands each tick.
    pub enabled: bool,
    pub long_poll_timeout_secs: u64,
    pub max_updates: u32,
    /// Ignore commands from chats other than the operator chat.
    pub operator_only: bool,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            long_poll_timeout_secs: 30,
            max_updates: MAX_UPDATES_LIMIT,
            operator_only: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: String,
    /// Write the log file as JSON lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: "app.log".to_string(),
            json: false,
        }
    }
}

/// Secrets resolved from the environment. Never logged.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub api_key: String,
    pub api_secret: SecretString,
    pub bot_token: SecretString,
    pub chat_id: String,
    pub address: String,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            let cfg = Self::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sweeper.asset.trim().is_empty() {
            anyhow::bail!("sweeper.asset must not be empty");
        }
        if self.sweeper.poll_interval_secs == 0 {
            anyhow::bail!("sweeper.poll_interval_secs must be greater than zero");
        }
        if self.exchange.timeout_secs == 0 || self.telegram.timeout_secs == 0 {
            anyhow::bail!("HTTP timeouts must be greater than zero");
        }
        if self.exchange.recv_window_ms == 0 || self.exchange.recv_window_ms > 60_000 {
            anyhow::bail!("exchange.recv_window_ms must be in 1..=60000");
        }
        if self.commands.max_updates == 0 || self.commands.max_updates > MAX_UPDATES_LIMIT {
            anyhow::bail!("commands.max_updates must be in 1..={MAX_UPDATES_LIMIT}");
        }
        Ok(())
    }

    /// Resolve all secrets referenced by env-var name.
    pub fn resolve_secrets(&self) -> Result<Secrets> {
        Ok(Secrets {
            api_key: Self::resolve_env(&self.exchange.api_key_env)?,
            api_secret: SecretString::new(Self::resolve_env(&self.exchange.api_secret_env)?),
            bot_token: SecretString::new(Self::resolve_env(&self.telegram.bot_token_env)?),
            chat_id: Self::resolve_env(&self.telegram.chat_id_env)?,
            address: Self::resolve_env(&self.sweeper.address_env)?,
        })
    }

    /// Resolve an environment variable name to a non-empty value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        let value = std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))?;
        let value = value.trim().to_string();
        if value.is_empty() {
            anyhow::bail!("Environment variable is empty: {env_name}");
        }
        Ok(value)
    }
}
