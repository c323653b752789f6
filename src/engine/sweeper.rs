//! Sweeper: one tick of the poll → decide → withdraw → notify loop.
//!
//! `Sweeper::tick` runs a single iteration and returns an [`Action`] for the
//! driver. Timing, sleeping and shutdown belong to the driver, so every
//! branch here is testable without real sleeps or network calls. Every
//! failure inside a tick is absorbed at the tick boundary by
//! [`Sweeper::report`]; only a halt decision escapes.

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::alerts::{notify, Messenger};
use crate::config::{AppConfig, CommandsConfig, Secrets};
use crate::engine::address::{classify_address, resolve_network};
use crate::engine::commands::CommandPoller;
use crate::engine::decision::{decide, Decision, WithdrawalPlan};
use crate::exchanges::ExchangeApi;
use crate::types::{
    format_amount, ExchangeError, InsufficientNetPolicy, NetReporting, SweepError,
    WithdrawalReceipt, WithdrawalRequest,
};

// ---------------------------------------------------------------------------
// Settings and results
// ---------------------------------------------------------------------------

/// Immutable per-process settings, built once at startup.
#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub asset: String,
    /// Cold-storage destination.
    pub address: String,
    pub operator_chat_id: String,
    pub network_override: Option<String>,
    pub on_insufficient_net: InsufficientNetPolicy,
    pub net_reporting: NetReporting,
    /// `None` disables the command poller.
    pub commands: Option<CommandsConfig>,
}

impl SweepSettings {
    pub fn from_config(cfg: &AppConfig, secrets: &Secrets) -> Self {
        Self {
            asset: cfg.sweeper.asset.clone(),
            address: secrets.address.clone(),
            operator_chat_id: secrets.chat_id.clone(),
            network_override: cfg.sweeper.network.clone(),
            on_insufficient_net: cfg.sweeper.on_insufficient_net,
            net_reporting: cfg.sweeper.net_reporting,
            commands: cfg.commands.enabled.then(|| cfg.commands.clone()),
        }
    }
}

/// What the driver should do after a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Continue,
    /// Stop the process.
    Halt { reason: String },
}

/// Successful result of a tick's sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    /// Nothing withdrawn.
    Held { balance: Decimal },
    Withdrawn {
        receipt: WithdrawalReceipt,
        plan: WithdrawalPlan,
    },
}

// ---------------------------------------------------------------------------
// Sweeper
// ---------------------------------------------------------------------------

pub struct Sweeper {
    settings: SweepSettings,
    /// Fetched once at startup and never refreshed.
    min_withdraw: Decimal,
    exchange: Box<dyn ExchangeApi>,
    messenger: Box<dyn Messenger>,
    poller: Option<CommandPoller>,
    ticks: u64,
}

impl Sweeper {
    /// Fetch the minimum withdrawal amount and build the sweeper.
    ///
    /// Fails with [`SweepError::StartupFatal`] (after notifying the operator)
    /// when the minimum cannot be obtained; the withdrawal logic must never
    /// run without it.
    pub async fn bootstrap(
        settings: SweepSettings,
        exchange: Box<dyn ExchangeApi>,
        messenger: Box<dyn Messenger>,
    ) -> Result<Self, SweepError> {
        let info = match exchange.asset_info(&settings.asset).await {
            Ok(info) => info,
            Err(e) => {
                let err = SweepError::StartupFatal(format!(
                    "Failed to get minimum {} withdrawal amount: {e}",
                    settings.asset
                ));
                error!(error = %err, "Unable to proceed without minimum withdrawal amount");
                notify(messenger.as_ref(), &settings.operator_chat_id, &err.to_string()).await;
                return Err(err);
            }
        };

        info!(
            asset = %settings.asset,
            min_withdraw = %format_amount(info.min_withdraw_amount),
            withdraw_fee = %format_amount(info.withdraw_fee),
            address_kind = %classify_address(&settings.address),
            network = %resolve_network(&settings.address, settings.network_override.as_deref()),
            commands = settings.commands.is_some(),
            "Sweeper ready"
        );

        let poller = settings
            .commands
            .as_ref()
            .map(|cfg| CommandPoller::new(cfg, &settings.operator_chat_id));

        Ok(Self {
            min_withdraw: info.min_withdraw_amount,
            settings,
            exchange,
            messenger,
            poller,
            ticks: 0,
        })
    }

    pub fn min_withdraw(&self) -> Decimal {
        self.min_withdraw
    }

    /// Run one iteration: answer pending commands, then sweep.
    pub async fn tick(&mut self) -> Action {
        self.ticks += 1;
        debug!(tick = self.ticks, "Starting tick");

        if let Some(poller) = self.poller.as_mut() {
            poller
                .poll(
                    self.exchange.as_ref(),
                    self.messenger.as_ref(),
                    &self.settings.asset,
                )
                .await;
        }

        match self.sweep().await {
            Ok(SweepOutcome::Held { balance }) => {
                debug!(
                    balance = %format_amount(balance),
                    minimum = %format_amount(self.min_withdraw),
                    "Balance below minimum withdrawal amount"
                );
                Action::Continue
            }
            Ok(SweepOutcome::Withdrawn { receipt, .. }) => {
                debug!(withdrawal_id = %receipt.id, "Tick complete");
                Action::Continue
            }
            Err(e) => self.report(e).await,
        }
    }

    /// Balance → fee → decision → withdrawal. Errors are returned, not
    /// reported.
    pub async fn sweep(&self) -> Result<SweepOutcome, SweepError> {
        let asset = self.settings.asset.as_str();

        let balance = self.exchange.free_balance(asset).await?;
        if balance < self.min_withdraw {
            return Ok(SweepOutcome::Held { balance });
        }

        let info = self.exchange.asset_info(asset).await?;

        let plan = match decide(
            balance,
            info.withdraw_fee,
            self.min_withdraw,
            self.settings.net_reporting,
        ) {
            Decision::Hold => return Ok(SweepOutcome::Held { balance }),
            Decision::InsufficientNet { amount, minimum } => {
                return Err(SweepError::InsufficientNet { amount, minimum })
            }
            Decision::Withdraw(plan) => plan,
        };

        if !info.withdraw_enabled {
            return Err(SweepError::Exchange(format!(
                "{asset} withdrawals are currently suspended by the exchange"
            )));
        }

        let network = resolve_network(
            &self.settings.address,
            self.settings.network_override.as_deref(),
        );
        let request = WithdrawalRequest::new(asset, &self.settings.address, plan.amount, &network);

        info!(
            amount = %request.amount,
            fee = %format_amount(plan.fee),
            network = %request.network,
            client_id = %request.client_id,
            "Submitting withdrawal"
        );

        let receipt = match self.exchange.withdraw(&request).await {
            Ok(receipt) => receipt,
            Err(ExchangeError::Rejected { code, message, .. }) => {
                return Err(SweepError::WithdrawalRejected {
                    request,
                    reason: format!("{message} (code {code})"),
                })
            }
            Err(ExchangeError::Transient(msg)) => {
                warn!(
                    client_id = %request.client_id,
                    "Withdrawal outcome unknown, check exchange history before the next sweep"
                );
                return Err(SweepError::Transient(msg));
            }
            Err(e @ ExchangeError::Unknown(_)) => return Err(SweepError::Exchange(e.to_string())),
        };

        let message = format!(
            "Successfully withdrawn {amount} {asset} (with a fee of {fee}) to cold storage. \
             Net amount deposited: {net} {asset}.",
            amount = request.amount,
            fee = format_amount(plan.fee),
            net = format_amount(plan.reported_net),
        );
        info!(withdrawal_id = %receipt.id, "{message}");
        self.notify(&message).await;

        Ok(SweepOutcome::Withdrawn { receipt, plan })
    }

    /// Log and notify according to the error kind, then decide whether the
    /// loop goes on.
    pub async fn report(&self, err: SweepError) -> Action {
        let asset = self.settings.asset.as_str();

        match &err {
            SweepError::StartupFatal(_) => {
                error!(error = %err, "Startup-fatal error inside the loop");
                self.notify(&err.to_string()).await;
                Action::Halt {
                    reason: err.to_string(),
                }
            }
            SweepError::InsufficientNet { .. } => {
                error!(
                    error = %err,
                    policy = ?self.settings.on_insufficient_net,
                    "Withdrawal amount is less than the minimum withdrawal amount"
                );
                self.notify(&format!("Failed to withdraw {asset}: {err}")).await;
                match self.settings.on_insufficient_net {
                    InsufficientNetPolicy::Exit => Action::Halt {
                        reason: err.to_string(),
                    },
                    InsufficientNetPolicy::Continue => Action::Continue,
                }
            }
            SweepError::WithdrawalRejected { request, reason } => {
                error!(
                    reason = %reason,
                    address = %request.address,
                    amount = %request.amount,
                    network = %request.network,
                    client_id = %request.client_id,
                    "Failed to withdraw"
                );
                self.notify(&format!("Failed to withdraw {asset}: {err}")).await;
                Action::Continue
            }
            SweepError::Transient(_) => {
                warn!(error = %err, "Transient failure, retrying next tick");
                self.notify(&err.to_string()).await;
                Action::Continue
            }
            SweepError::Exchange(_) => {
                error!(error = %err, "Exchange request failed");
                self.notify(&err.to_string()).await;
                Action::Continue
            }
            SweepError::Notification(_) => {
                error!(error = %err, "Notification failure");
                Action::Continue
            }
        }
    }

    async fn notify(&self, text: &str) -> bool {
        notify(
            self.messenger.as_ref(),
            &self.settings.operator_chat_id,
            text,
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
