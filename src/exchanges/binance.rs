//! Binance spot account integration.
//!
//! Covers the three calls the sweeper needs: free balance, asset withdrawal
//! metadata and withdrawal submission. All three are signed endpoints.
//!
//! API docs: https://developers.binance.com/docs/binance-spot-api-docs
//! Wallet docs: https://developers.binance.com/docs/wallet
//! Auth: `X-MBX-APIKEY` header plus an HMAC-SHA256 `signature` over the
//! query string, which must carry `timestamp` and may carry `recvWindow`.
//!
//! Error bodies look like `{"code": -1102, "msg": "..."}`. 4xx responses
//! carrying one are rejections; 418/429 (rate limiting) and 5xx are
//! transient.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::ExchangeApi;
use crate::config::ExchangeConfig;
use crate::types::{AssetInfo, ExchangeError, WithdrawalReceipt, WithdrawalRequest};

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const ACCOUNT_PATH: &str = "/api/v3/account";
const ASSET_DETAIL_PATH: &str = "/sapi/v1/asset/assetDetail";
const WITHDRAW_PATH: &str = "/sapi/v1/capital/withdraw/apply";

// ---------------------------------------------------------------------------
// API response types (Binance JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(default)]
    balances: Vec<RawBalance>,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    asset: String,
    free: String,
}

/// One entry of the `assetDetail` map. Binance has returned both numbers
/// and strings for the amount fields, so they stay untyped until parsed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssetDetail {
    min_withdraw_amount: serde_json::Value,
    withdraw_fee: serde_json::Value,
    #[serde(default = "default_true")]
    withdraw_status: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct WithdrawResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Binance REST client.
pub struct BinanceClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_secret: SecretString,
    recv_window_ms: u64,
}

impl BinanceClient {
    pub fn new(
        api_key: String,
        api_secret: SecretString,
        cfg: &ExchangeConfig,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent("COLDSWEEP/0.1.0")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client for Binance: {e}"))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
            recv_window_ms: cfg.recv_window_ms,
        })
    }

    // -- Internal helpers ------------------------------------------------

    /// Build `params&timestamp=..&recvWindow=..&signature=..`.
    fn signed_query(&self, params: &[(&str, &str)]) -> Result<String, ExchangeError> {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let recv_window = self.recv_window_ms.to_string();

        let mut pairs: Vec<(&str, &str)> = params.to_vec();
        pairs.push(("recvWindow", &recv_window));
        pairs.push(("timestamp", &timestamp));

        let query = encode_query(&pairs);
        let signature = sign_payload(self.api_secret.expose_secret(), &query)?;
        Ok(format!("{query}&signature={signature}"))
    }

    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ExchangeError> {
        let query = self.signed_query(params)?;
        let url = format!("{}{path}?{query}", self.base_url);

        debug!(method = %method, path, "Binance signed request");

        let resp = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ExchangeError::Unknown(format!("Failed to parse Binance response from {path}: {e}"))
        })
    }
}

// ---------------------------------------------------------------------------
// ExchangeApi trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ExchangeApi for BinanceClient {
    async fn free_balance(&self, asset: &str) -> Result<Decimal, ExchangeError> {
        let account: AccountResponse = self.send_signed(Method::GET, ACCOUNT_PATH, &[]).await?;
        let balance = free_balance_from(&account, asset)?;
        debug!(asset, balance = %balance, "Binance free balance");
        Ok(balance)
    }

    async fn asset_info(&self, asset: &str) -> Result<AssetInfo, ExchangeError> {
        let detail: HashMap<String, RawAssetDetail> = self
            .send_signed(Method::GET, ASSET_DETAIL_PATH, &[("asset", asset)])
            .await?;
        asset_info_from(&detail, asset)
    }

    async fn withdraw(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalReceipt, ExchangeError> {
        let params = [
            ("coin", request.coin.as_str()),
            ("address", request.address.as_str()),
            ("amount", request.amount.as_str()),
            ("network", request.network.as_str()),
            ("withdrawOrderId", request.client_id.as_str()),
        ];
        let resp: WithdrawResponse = self.send_signed(Method::POST, WITHDRAW_PATH, &params).await?;

        info!(
            withdrawal_id = %resp.id,
            client_id = %request.client_id,
            amount = %request.amount,
            network = %request.network,
            "Binance withdrawal accepted"
        );

        Ok(WithdrawalReceipt {
            id: resp.id,
            request: request.clone(),
            timestamp: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

fn encode_query(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Hex-encoded HMAC-SHA256 of `payload` keyed by the API secret.
fn sign_payload(secret: &str, payload: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Unknown(format!("Invalid API secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn classify_transport(err: reqwest::Error) -> ExchangeError {
    // Never let the signed URL (and its signature) reach the logs.
    let err = err.without_url();
    if err.is_timeout() || err.is_connect() {
        ExchangeError::Transient(err.to_string())
    } else {
        ExchangeError::Unknown(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str) -> ExchangeError {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::IM_A_TEAPOT
    {
        return ExchangeError::Transient(format!("Binance HTTP {status}: {body}"));
    }

    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(api) => ExchangeError::Rejected {
            status: status.as_u16(),
            code: api.code,
            message: api.msg,
        },
        Err(_) => ExchangeError::Unknown(format!("Binance HTTP {status}: {body}")),
    }
}

/// Parse an amount that may arrive as a JSON string or number.
fn parse_decimal(value: &serde_json::Value) -> Result<Decimal, ExchangeError> {
    match value {
        serde_json::Value::String(s) => parse_decimal_str(s),
        serde_json::Value::Number(n) => parse_decimal_str(&n.to_string()),
        other => Err(ExchangeError::Unknown(format!(
            "Expected a decimal amount, got {other}"
        ))),
    }
}

fn parse_decimal_str(text: &str) -> Result<Decimal, ExchangeError> {
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| ExchangeError::Unknown(format!("Invalid decimal amount {text:?}: {e}")))
}

fn free_balance_from(account: &AccountResponse, asset: &str) -> Result<Decimal, ExchangeError> {
    match account.balances.iter().find(|b| b.asset == asset) {
        Some(b) => parse_decimal_str(&b.free),
        // Binance omits assets the account has never held.
        None => Ok(Decimal::ZERO),
    }
}

fn asset_info_from(
    detail: &HashMap<String, RawAssetDetail>,
    asset: &str,
) -> Result<AssetInfo, ExchangeError> {
    let raw = detail
        .get(asset)
        .ok_or_else(|| ExchangeError::Unknown(format!("Asset {asset} missing from asset detail")))?;

    Ok(AssetInfo {
        asset: asset.to_string(),
        withdraw_fee: parse_decimal(&raw.withdraw_fee)?,
        min_withdraw_amount: parse_decimal(&raw.min_withdraw_amount)?,
        withdraw_enabled: raw.withdraw_status,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
