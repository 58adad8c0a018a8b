use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::GateError;

/// A trading pair such as `BTC/USDT`, optionally settled in another asset (`BTC/USDT:USDT`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    base: String,
    quote: String,
    settlement: Option<String>,
}

impl Symbol {
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Asset margin is held in: the explicit settlement asset, else the quote
    pub fn settlement(&self) -> &str {
        self.settlement.as_deref().unwrap_or(&self.quote)
    }
}

impl FromStr for Symbol {
    type Err = GateError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (pair, settlement) = match raw.split_once(':') {
            Some((pair, settle)) => (pair, Some(settle)),
            None => (raw, None),
        };
        let (base, quote) = pair
            .split_once('/')
            .ok_or_else(|| GateError::UnknownSymbol(raw.to_string()))?;

        if base.is_empty() || quote.is_empty() || settlement.is_some_and(str::is_empty) {
            return Err(GateError::UnknownSymbol(raw.to_string()));
        }

        Ok(Self {
            base: base.to_string(),
            quote: quote.to_string(),
            settlement: settlement.map(str::to_string),
        })
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.settlement {
            Some(settle) => write!(f, "{}/{}:{}", self.base, self.quote, settle),
            None => write!(f, "{}/{}", self.base, self.quote),
        }
    }
}

/// Venue-side order minimums for one symbol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketLimits {
    /// Minimum order size in base units
    #[serde(default)]
    pub min_order_amount: Option<Decimal>,
    /// Minimum order value in quote units
    #[serde(default)]
    pub min_order_cost: Option<Decimal>,
}

impl MarketLimits {
    pub fn new(min_order_amount: Option<Decimal>, min_order_cost: Option<Decimal>) -> Self {
        Self {
            min_order_amount,
            min_order_cost,
        }
    }

    /// Minimum amount, with a missing venue value treated as zero
    pub fn min_amount(&self) -> Decimal {
        self.min_order_amount.unwrap_or(Decimal::ZERO)
    }

    /// Minimum cost, with a missing venue value treated as zero
    pub fn min_cost(&self) -> Decimal {
        self.min_order_cost.unwrap_or(Decimal::ZERO)
    }
}
