//! End-to-end sweep ticks against the in-memory exchange and messenger.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use coldsweep::config::CommandsConfig;
use coldsweep::engine::sweeper::{Action, SweepOutcome, SweepSettings, Sweeper};
use coldsweep::types::*;

use crate::mock_exchange::{MockExchange, MockMessenger};

const OPERATOR: &str = "42";
const ADDRESS: &str = "3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy";
const MIN: Decimal = dec!(0.00100000);

fn settings() -> SweepSettings {
    SweepSettings {
        asset: "BTC".to_string(),
        address: ADDRESS.to_string(),
        operator_chat_id: OPERATOR.to_string(),
        network_override: None,
        on_insufficient_net: InsufficientNetPolicy::Exit,
        net_reporting: NetReporting::Exact,
        commands: None,
    }
}

async fn start(
    settings: SweepSettings,
    exchange: &MockExchange,
    messenger: &MockMessenger,
) -> Sweeper {
    Sweeper::bootstrap(
        settings,
        Box::new(exchange.clone()),
        Box::new(messenger.clone()),
    )
    .await
    .expect("bootstrap")
}

#[tokio::test]
async fn test_scenario_withdraws_with_exact_net_report() {
    let exchange = MockExchange::new(dec!(0.01000000), dec!(0.00005000), MIN);
    let messenger = MockMessenger::new();
    let mut sweeper = start(settings(), &exchange, &messenger).await;

    assert_eq!(sweeper.tick().await, Action::Continue);

    let withdrawals = exchange.withdrawals();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].amount, "0.00995000");
    assert_eq!(withdrawals[0].network, "BTC");
    assert_eq!(withdrawals[0].address, ADDRESS);

    let sent = messenger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, OPERATOR);
    assert!(sent[0].1.contains("Net amount deposited: 0.00995000 BTC"));
}

#[tokio::test]
async fn test_scenario_withdraws_with_double_fee_net_report() {
    let exchange = MockExchange::new(dec!(0.01000000), dec!(0.00005000), MIN);
    let messenger = MockMessenger::new();
    let mut cfg = settings();
    cfg.net_reporting = NetReporting::DoubleFee;
    let mut sweeper = start(cfg, &exchange, &messenger).await;

    sweeper.tick().await;

    assert_eq!(exchange.withdrawals()[0].amount, "0.00995000");
    assert!(messenger.sent()[0]
        .1
        .contains("Net amount deposited: 0.00990000 BTC"));
}

#[tokio::test]
async fn test_scenario_below_minimum_does_nothing() {
    let exchange = MockExchange::new(dec!(0.00050000), dec!(0.00005000), MIN);
    let messenger = MockMessenger::new();
    let mut sweeper = start(settings(), &exchange, &messenger).await;

    for _ in 0..3 {
        assert_eq!(sweeper.tick().await, Action::Continue);
    }

    assert!(exchange.withdrawals().is_empty());
    assert!(messenger.sent().is_empty());
    assert_eq!(exchange.balance_reads(), 3);
}

#[tokio::test]
async fn test_scenario_fee_pushes_amount_below_minimum() {
    let exchange = MockExchange::new(dec!(0.00150000), dec!(0.00060000), MIN);
    let messenger = MockMessenger::new();
    let mut sweeper = start(settings(), &exchange, &messenger).await;

    let action = sweeper.tick().await;
    assert!(matches!(action, Action::Halt { .. }));

    assert!(exchange.withdrawals().is_empty());
    let sent = messenger.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("0.00090000"));
    assert!(sent[0].1.contains("0.00100000"));
}

#[tokio::test]
async fn test_scenario_fee_pushes_amount_below_minimum_continue_policy() {
    let exchange = MockExchange::new(dec!(0.00150000), dec!(0.00060000), MIN);
    let messenger = MockMessenger::new();
    let mut cfg = settings();
    cfg.on_insufficient_net = InsufficientNetPolicy::Continue;
    let mut sweeper = start(cfg, &exchange, &messenger).await;

    assert_eq!(sweeper.tick().await, Action::Continue);

    // Fee drops; the next tick goes through.
    exchange.set_fee(dec!(0.00010000));
    assert_eq!(sweeper.tick().await, Action::Continue);

    let withdrawals = exchange.withdrawals();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].amount, "0.00140000");
    assert_eq!(messenger.sent().len(), 2);
}

#[tokio::test]
async fn test_scenario_timeout_then_recovery() {
    let exchange = MockExchange::new(dec!(0.01), dec!(0.00005), MIN);
    exchange.fail_next_balance_read(ExchangeError::Transient("operation timed out".into()));
    let messenger = MockMessenger::new();
    let mut sweeper = start(settings(), &exchange, &messenger).await;

    assert_eq!(sweeper.tick().await, Action::Continue);
    assert!(exchange.withdrawals().is_empty());
    let sent = messenger.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.starts_with("Read timeout occurred"));

    assert_eq!(sweeper.tick().await, Action::Continue);
    assert_eq!(exchange.withdrawals().len(), 1);
    assert_eq!(messenger.sent().len(), 2);
}

#[tokio::test]
async fn test_scenario_rejected_withdrawal_keeps_looping() {
    let exchange = MockExchange::new(dec!(0.01), dec!(0.00005), MIN);
    exchange.reject_withdrawals(ExchangeError::Rejected {
        status: 400,
        code: -1102,
        message: "Illegal characters found in parameter 'address'".into(),
    });
    let messenger = MockMessenger::new();
    let mut sweeper = start(settings(), &exchange, &messenger).await;

    assert_eq!(sweeper.tick().await, Action::Continue);
    assert_eq!(sweeper.tick().await, Action::Continue);

    let sent = messenger.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].1.contains("Amount=0.00995000"));
    assert!(sent[0].1.contains(&format!("Address={ADDRESS}")));
    assert_eq!(exchange.balance(), dec!(0.01));
}

#[tokio::test]
async fn test_scenario_startup_without_minimum_is_fatal() {
    let exchange = MockExchange::new(dec!(0.01), dec!(0.00005), MIN);
    exchange.fail_asset_info(ExchangeError::Unknown("Asset BTC missing".into()));
    let messenger = MockMessenger::new();

    let result = Sweeper::bootstrap(
        settings(),
        Box::new(exchange.clone()),
        Box::new(messenger.clone()),
    )
    .await;

    assert!(matches!(result, Err(SweepError::StartupFatal(_))));
    assert_eq!(exchange.balance_reads(), 0);
    assert!(exchange.withdrawals().is_empty());
    assert_eq!(messenger.sent().len(), 1);
}

#[tokio::test]
async fn test_scenario_notification_outage_does_not_stop_withdrawal() {
    let exchange = MockExchange::new(dec!(0.01), dec!(0.00005), MIN);
    let messenger = MockMessenger::new();
    messenger.fail_sends(true);
    let mut sweeper = start(settings(), &exchange, &messenger).await;

    assert_eq!(sweeper.tick().await, Action::Continue);
    assert_eq!(exchange.withdrawals().len(), 1);
    assert!(messenger.sent().is_empty());
}

#[tokio::test]
async fn test_scenario_balance_command_then_sweep() {
    let exchange = MockExchange::new(dec!(0.00050000), dec!(0.00005), MIN);
    let messenger = MockMessenger::new();
    messenger.push_inbound(500, OPERATOR, "/balance");

    let mut cfg = settings();
    cfg.commands = Some(CommandsConfig::default());
    let mut sweeper = start(cfg, &exchange, &messenger).await;

    assert_eq!(sweeper.tick().await, Action::Continue);
    let sent = messenger.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0], (OPERATOR.to_string(), "Current BTC balance: 0.00050000".to_string()));
    // Command reply plus the sweep itself.
    assert_eq!(exchange.balance_reads(), 2);

    // Already-seen update is not redelivered.
    exchange.set_balance(dec!(0.0007));
    assert_eq!(sweeper.tick().await, Action::Continue);
    assert_eq!(messenger.sent().len(), 1);
    assert_eq!(messenger.offsets_seen(), vec![None, Some(501)]);
}

#[tokio::test]
async fn test_sweep_reports_outcome() {
    let exchange = MockExchange::new(dec!(0.002), dec!(0.0005), MIN);
    let messenger = MockMessenger::new();
    let sweeper = start(settings(), &exchange, &messenger).await;

    match sweeper.sweep().await.unwrap() {
        SweepOutcome::Withdrawn { receipt, plan } => {
            assert_eq!(plan.amount, dec!(0.0015));
            assert_eq!(receipt.request.amount, "0.00150000");
            assert!(receipt.id.starts_with("MOCK-"));
        }
        other => panic!("expected withdrawal, got {other:?}"),
    }

    // Balance now zero: the next sweep holds.
    assert_eq!(
        sweeper.sweep().await.unwrap(),
        SweepOutcome::Held {
            balance: Decimal::ZERO
        }
    );
}
