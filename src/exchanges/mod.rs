//! Exchange integrations.
//!
//! Defines the `ExchangeApi` trait consumed by the sweep engine and the
//! Binance implementation that backs it in production.

pub mod binance;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{AssetInfo, ExchangeError, WithdrawalReceipt, WithdrawalRequest};

/// Abstraction over a custodial exchange account.
///
/// Implementors must classify failures into [`ExchangeError`] kinds so the
/// engine can tell a refused withdrawal from a timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Free (unlocked) balance of `asset`.
    async fn free_balance(&self, asset: &str) -> Result<Decimal, ExchangeError>;

    /// Withdrawal fee, minimum amount and withdrawal status for `asset`.
    async fn asset_info(&self, asset: &str) -> Result<AssetInfo, ExchangeError>;

    /// Submit a withdrawal. Called at most once per qualifying tick.
    async fn withdraw(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalReceipt, ExchangeError>;
}
