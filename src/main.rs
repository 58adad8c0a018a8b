use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tradegate::config::AppConfig;
use tradegate::domain::{Signal, Symbol};
use tradegate::exchange::build_simulated_gate;
use tradegate::gate::SignalConsumer;

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple, shutdown_signal};

#[derive(Parser)]
#[command(name = "tradegate")]
#[command(version)]
#[command(about = "Turns directional trading signals into orders on a shared account", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding default.toml and environment overrides
    #[arg(long, global = true, default_value = "config", env = "TRADEGATE_CONFIG_DIR")]
    config_dir: PathBuf,

    /// Emit JSON logs regardless of configuration
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON array of signals against the simulated exchange
    Replay {
        /// File containing the signals
        #[arg(short, long)]
        signals: PathBuf,
    },
    /// Load and validate configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::CheckConfig => {
            init_logging_simple();
            let config = load_config(&cli.config_dir)?;
            println!(
                "Configuration OK: {} ({}), {} markets, {} balances",
                config.exchange.name,
                config.exchange.trading_mode,
                config.markets.len(),
                config.balances.len()
            );
        }
        Commands::Replay { signals } => {
            let mut config = load_config(&cli.config_dir)?;
            config.logging.json |= cli.json_logs;
            init_logging(&config.logging);
            run_replay(&config, signals).await?;
        }
    }

    Ok(())
}

fn load_config(dir: &Path) -> anyhow::Result<AppConfig> {
    let config = AppConfig::load_from(dir)
        .with_context(|| format!("failed to load configuration from {}", dir.display()))?;
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("  - {error}");
        }
        bail!("configuration has {} problem(s)", errors.len());
    }
    Ok(config)
}

async fn run_replay(config: &AppConfig, path: &Path) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let signals: Vec<Signal> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of signals", path.display()))?;

    let gate = build_simulated_gate(config).await?;
    info!("Replaying {} signals from {}", signals.len(), path.display());

    let (tx, rx) = mpsc::channel(config.gate.signal_buffer);
    let consumer = tokio::spawn(SignalConsumer::new(gate.coordinator.clone()).run(rx));

    let feed = async move {
        for signal in signals {
            if tx.send(signal).await.is_err() {
                break;
            }
        }
    };
    tokio::select! {
        _ = feed => {}
        _ = shutdown_signal() => {
            warn!("Interrupted, waiting for in-flight attempts");
        }
    }

    let summary = consumer.await.context("signal consumer task failed")?;
    let snapshot = gate.ledger.read_snapshot().await;

    println!("{summary}");
    println!(
        "Ledger: {} assets traded, {} forced refreshes",
        snapshot.traded_asset_count(),
        gate.ledger.refresh_count()
    );

    let valuations = quote_valuations(config);
    let mut assets: Vec<&String> = valuations.keys().collect();
    assets.sort();
    for asset in assets {
        let ratio = snapshot.holdings_ratio(asset, &valuations);
        if !ratio.is_zero() {
            println!(
                "  {asset}: {}% of portfolio",
                (ratio * Decimal::ONE_HUNDRED).round_dp(2)
            );
        }
    }
    Ok(())
}

/// Per-asset prices in the configured quote assets, taken from the market table
fn quote_valuations(config: &AppConfig) -> HashMap<String, Decimal> {
    let mut valuations = HashMap::new();
    for market in &config.markets {
        let Ok(pair) = market.symbol.parse::<Symbol>() else {
            continue;
        };
        valuations.insert(pair.quote().to_string(), Decimal::ONE);
        valuations.insert(pair.base().to_string(), market.price);
    }
    valuations
}
