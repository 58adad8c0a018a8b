use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::MarketLimits;
use crate::error::{GateError, Result};
use crate::gate::{
    AccountContext, EligibilityEvaluator, LeveragedContext, OrderCreationCoordinator, SpotContext,
};
use crate::ledger::Ledger;

use super::simulator::SimulatedExchange;
use super::sizing::LinearPositionSizer;
use super::TradingMode;

/// Everything a replay or paper session needs, wired to one simulated account
pub struct SimulatedGate {
    pub exchange: Arc<SimulatedExchange>,
    pub ledger: Arc<Ledger>,
    pub coordinator: Arc<OrderCreationCoordinator>,
}

/// Build a simulated exchange from `AppConfig`.
pub fn build_simulated_exchange(app_config: &AppConfig) -> Result<SimulatedExchange> {
    let mode = app_config.exchange.mode()?;

    let mut exchange = SimulatedExchange::new(&app_config.exchange.name, mode)
        .with_leverage(app_config.exchange.leverage);
    for market in &app_config.markets {
        if market.price <= Decimal::ZERO {
            return Err(GateError::Validation(format!(
                "{}: price must be positive",
                market.symbol
            )));
        }
        let limits = MarketLimits::new(market.min_amount, market.min_cost);
        exchange = exchange.with_market(&market.symbol, limits, market.price);
    }
    for balance in &app_config.balances {
        exchange = exchange.with_balance(&balance.asset, balance.amount);
    }
    Ok(exchange)
}

/// Create the exchange, ledger and coordinator for `AppConfig`.
///
/// The ledger is seeded from the exchange account and uses it as its
/// balance authority.
pub async fn build_simulated_gate(app_config: &AppConfig) -> Result<SimulatedGate> {
    let exchange = Arc::new(build_simulated_exchange(app_config)?);

    for market in &app_config.markets {
        if !market.active {
            exchange.set_market_active(&market.symbol, false).await?;
        }
    }

    let ledger = Arc::new(
        Ledger::new(exchange.balances().await)
            .with_authority(exchange.clone())
            .with_refresh_timeout(app_config.gate.refresh_timeout()),
    );

    let context = match exchange.mode() {
        TradingMode::Spot => AccountContext::Spot(SpotContext),
        TradingMode::Future => AccountContext::Leveraged(LeveragedContext {
            leverage: app_config.exchange.leverage,
            sizer: Arc::new(LinearPositionSizer::new(app_config.exchange.max_leverage)),
            prices: exchange.clone(),
        }),
    };
    let evaluator =
        EligibilityEvaluator::new(exchange.clone(), context, app_config.gate.lookup_timeout());

    let coordinator = Arc::new(OrderCreationCoordinator::new(
        exchange.name(),
        ledger.clone(),
        evaluator,
        exchange.clone(),
    ));

    info!(
        "Simulated {} gate ready on {} ({} markets)",
        exchange.mode(),
        exchange.name(),
        app_config.markets.len()
    );

    Ok(SimulatedGate {
        exchange,
        ledger,
        coordinator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DirectionalState, Signal};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_spot_gate_from_default_config() {
        let config = AppConfig::default_config(TradingMode::Spot);
        let gate = build_simulated_gate(&config).await.unwrap();
        assert!(!gate.coordinator.guards().is_held("BTC/USDT"));

        let outcome = gate
            .coordinator
            .attempt(&Signal::new("BTC/USDT", DirectionalState::VeryLong))
            .await;
        assert!(outcome.is_created(), "{outcome}");
        // Everything but the rounding dust went into BTC
        let snapshot = gate.ledger.read_snapshot().await;
        assert!(snapshot.available_balance("USDT") < dec!(0.01));
        assert_eq!(snapshot.available_balance("BTC"), dec!(0.03333333));
    }

    #[tokio::test]
    async fn test_future_gate_uses_leveraged_context() {
        let mut config = AppConfig::default_config(TradingMode::Future);
        config.exchange.leverage = dec!(5);
        config.markets[0].symbol = "BTC/USDT:USDT".to_string();
        let gate = build_simulated_gate(&config).await.unwrap();
        assert_eq!(gate.exchange.leverage(), dec!(5));

        let outcome = gate
            .coordinator
            .attempt(&Signal::new("BTC/USDT:USDT", DirectionalState::Short))
            .await;
        assert!(outcome.is_created(), "{outcome}");
        let snapshot = gate.ledger.read_snapshot().await;
        assert!(snapshot.position_quantity("BTC/USDT:USDT") < Decimal::ZERO);
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        let mut config = AppConfig::default_config(TradingMode::Spot);
        config.exchange.trading_mode = "options".to_string();
        assert!(build_simulated_exchange(&config).is_err());
    }
}
