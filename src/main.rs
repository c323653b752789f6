//! COLDSWEEP: exchange-to-cold-storage sweeping agent
//!
//! Entry point. Loads configuration, initialises structured logging to
//! stdout and the log file, fetches the exchange's minimum withdrawal
//! amount, then runs sweep ticks separated by a fixed sleep until Ctrl+C
//! or a halt decision.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

use coldsweep::alerts::telegram::TelegramClient;
use coldsweep::config::{self, AppConfig};
use coldsweep::engine::sweeper::{Action, SweepSettings, Sweeper};
use coldsweep::exchanges::binance::BinanceClient;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

const BANNER: &str = r#"
   ____ ___  _     ____  ______        _______ _____ ____
  / ___/ _ \| |   |  _ \/ ___\ \      / / ____| ____|  _ \
 | |  | | | | |   | | | \___ \\ \ /\ / /|  _| |  _| | |_) |
 | |__| |_| | |___| |_| |___) |\ V  V / | |___| |___|  __/
  \____\___/|_____|____/|____/  \_/\_/  |_____|_____|_|

  Exchange → cold storage sweeper
  v0.1.0
"#;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("COLDSWEEP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::AppConfig::load_or_default(&config_path)?;

    // Held for the process lifetime so buffered log lines are flushed.
    let _log_guard = init_logging(&cfg)?;

    println!("{BANNER}");
    info!(
        config = %config_path,
        asset = %cfg.sweeper.asset,
        poll_interval_secs = cfg.sweeper.poll_interval_secs,
        on_insufficient_net = ?cfg.sweeper.on_insufficient_net,
        net_reporting = ?cfg.sweeper.net_reporting,
        commands = cfg.commands.enabled,
        "COLDSWEEP starting up"
    );

    // -- Initialise components -------------------------------------------

    let secrets = cfg.resolve_secrets().inspect_err(|e| {
        error!(error = %e, "Missing credentials");
    })?;

    let exchange = BinanceClient::new(
        secrets.api_key.clone(),
        secrets.api_secret.clone(),
        &cfg.exchange,
    )?;
    let messenger = TelegramClient::new(secrets.bot_token.clone(), &cfg.telegram)?;
    let settings = SweepSettings::from_config(&cfg, &secrets);

    let mut sweeper =
        Sweeper::bootstrap(settings, Box::new(exchange), Box::new(messenger)).await?;

    // -- Main loop -------------------------------------------------------

    let poll_interval = Duration::from_secs(cfg.sweeper.poll_interval_secs);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.sweeper.poll_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        // A tick is never cancelled part-way; shutdown is only observed
        // while sleeping.
        if let Action::Halt { reason } = sweeper.tick().await {
            error!(reason = %reason, "Sweeper halted");
            anyhow::bail!("Sweeper halted: {reason}");
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("COLDSWEEP shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber: human-readable stdout plus the
/// append-only log file.
fn init_logging(cfg: &AppConfig) -> Result<WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let path = Path::new(&cfg.logging.file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", cfg.logging.file))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("coldsweep=info"))
    };

    let json_logging = cfg.logging.json || std::env::var("COLDSWEEP_LOG_JSON").is_ok();

    let stdout_layer = fmt::layer().with_target(true).with_filter(env_filter());
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    if json_logging {
        tracing_subscriber::registry()
            .with(stdout_layer)
            .with(file_layer.json().with_filter(env_filter()))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(stdout_layer)
            .with(file_layer.with_filter(env_filter()))
            .init();
    }

    Ok(guard)
}
