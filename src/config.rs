use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::exchange::{parse_trading_mode, TradingMode};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub exchange: ExchangeConfig,
    pub gate: GateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Markets known to the simulated exchange
    #[serde(default)]
    pub markets: Vec<MarketConfig>,
    /// Starting balances of the paper account
    #[serde(default)]
    pub balances: Vec<BalanceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Exchange name used in logs (e.g., "binance")
    pub name: String,
    /// "spot" or "future"
    #[serde(default = "default_trading_mode")]
    pub trading_mode: String,
    /// Leverage applied when sizing leveraged orders
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,
    /// Upper bound for leverage
    #[serde(default = "default_max_leverage")]
    pub max_leverage: Decimal,
}

fn default_trading_mode() -> String {
    "spot".to_string()
}

fn default_leverage() -> Decimal {
    Decimal::ONE
}

fn default_max_leverage() -> Decimal {
    Decimal::from(100)
}

impl ExchangeConfig {
    pub fn mode(&self) -> crate::error::Result<TradingMode> {
        parse_trading_mode(&self.trading_mode)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Timeout for market-limits and price lookups in milliseconds
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_ms: u64,
    /// Timeout for a forced ledger refresh in milliseconds
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_ms: u64,
    /// Capacity of the incoming signal channel
    #[serde(default = "default_signal_buffer")]
    pub signal_buffer: usize,
}

fn default_lookup_timeout() -> u64 {
    10_000
}

fn default_refresh_timeout() -> u64 {
    30_000
}

fn default_signal_buffer() -> usize {
    256
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: default_lookup_timeout(),
            refresh_timeout_ms: default_refresh_timeout(),
            signal_buffer: default_signal_buffer(),
        }
    }
}

impl GateConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    /// Trading pair, e.g. "BTC/USDT" or "BTC/USDT:USDT"
    pub symbol: String,
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    #[serde(default)]
    pub min_cost: Option<Decimal>,
    /// Reference price used for fills
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceConfig {
    pub asset: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("exchange.name", "simulator")?
            .set_default("exchange.trading_mode", "spot")?
            .set_default("gate.lookup_timeout_ms", default_lookup_timeout())?
            .set_default("gate.refresh_timeout_ms", default_refresh_timeout())?
            .set_default("gate.signal_buffer", default_signal_buffer() as u64)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TRADEGATE_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TRADEGATE__GATE__LOOKUP_TIMEOUT_MS, etc.)
            .add_source(
                Environment::with_prefix("TRADEGATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Create a default configuration for CLI usage
    pub fn default_config(trading_mode: TradingMode) -> Self {
        use rust_decimal_macros::dec;

        Self {
            exchange: ExchangeConfig {
                name: "simulator".to_string(),
                trading_mode: trading_mode.as_str().to_string(),
                leverage: Decimal::ONE,
                max_leverage: default_max_leverage(),
            },
            gate: GateConfig::default(),
            logging: LoggingConfig::default(),
            markets: vec![MarketConfig {
                symbol: "BTC/USDT".to_string(),
                min_amount: Some(dec!(0.001)),
                min_cost: Some(dec!(10)),
                price: dec!(30000),
                active: true,
            }],
            balances: vec![BalanceConfig {
                asset: "USDT".to_string(),
                amount: dec!(1000),
            }],
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.exchange.mode() {
            errors.push(e.to_string());
        }

        if self.exchange.leverage < Decimal::ONE {
            errors.push("leverage must be at least 1".to_string());
        }

        if self.exchange.max_leverage < self.exchange.leverage {
            errors.push("max_leverage must not be below leverage".to_string());
        }

        if self.gate.lookup_timeout_ms == 0 {
            errors.push("lookup_timeout_ms must be positive".to_string());
        }

        if self.gate.refresh_timeout_ms == 0 {
            errors.push("refresh_timeout_ms must be positive".to_string());
        }

        if self.gate.signal_buffer == 0 {
            errors.push("signal_buffer must be positive".to_string());
        }

        for market in &self.markets {
            if market.symbol.parse::<crate::domain::Symbol>().is_err() {
                errors.push(format!("invalid market symbol: {}", market.symbol));
            }
            if market.price <= Decimal::ZERO {
                errors.push(format!("{}: price must be positive", market.symbol));
            }
            let negative = |v: Option<Decimal>| v.is_some_and(|v| v < Decimal::ZERO);
            if negative(market.min_amount) || negative(market.min_cost) {
                errors.push(format!("{}: limits must not be negative", market.symbol));
            }
        }

        for balance in &self.balances {
            if balance.amount < Decimal::ZERO {
                errors.push(format!("{}: balance must not be negative", balance.asset));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
