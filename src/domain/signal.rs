use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use super::OrderSide;
use crate::gate::clamp;

/// Directional evaluation state, ordered from most bearish to most bullish.
///
/// Deserializes through [`FromStr`], so `VERY_SHORT` and `very-short` are
/// accepted and unknown values become `Unhandled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum DirectionalState {
    VeryShort,
    Short,
    Neutral,
    Long,
    VeryLong,
    /// Any state this gate does not act on
    Unhandled,
}

impl DirectionalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectionalState::VeryShort => "very_short",
            DirectionalState::Short => "short",
            DirectionalState::Neutral => "neutral",
            DirectionalState::Long => "long",
            DirectionalState::VeryLong => "very_long",
            DirectionalState::Unhandled => "unhandled",
        }
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, DirectionalState::VeryShort | DirectionalState::Short)
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, DirectionalState::Long | DirectionalState::VeryLong)
    }

    /// Whether the state asks for any order at all
    pub fn is_actionable(&self) -> bool {
        self.is_bearish() || self.is_bullish()
    }

    /// Sell for bearish states, buy for everything else
    pub fn side(&self) -> OrderSide {
        if self.is_bearish() {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        }
    }
}

impl fmt::Display for DirectionalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DirectionalState {
    type Err = Infallible;

    /// Unknown values parse to `Unhandled` instead of failing
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Ok(match normalized.as_str() {
            "very_short" => DirectionalState::VeryShort,
            "short" => DirectionalState::Short,
            "neutral" => DirectionalState::Neutral,
            "long" => DirectionalState::Long,
            "very_long" => DirectionalState::VeryLong,
            _ => DirectionalState::Unhandled,
        })
    }
}

impl From<String> for DirectionalState {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(state) => state,
            Err(never) => match never {},
        }
    }
}

/// A directional trading instruction for one symbol.
///
/// Consumed exactly once by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub state: DirectionalState,
    /// Evaluator score in [-1, 1]
    #[serde(default)]
    pub final_note: Decimal,
    /// Strategy-specific data forwarded untouched to the dispatcher
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Signal {
    pub fn new(symbol: impl Into<String>, state: DirectionalState) -> Self {
        Self {
            symbol: symbol.into(),
            state,
            final_note: Decimal::ZERO,
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_final_note(mut self, final_note: Decimal) -> Self {
        self.final_note = final_note;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// What the coordinator hands to an order dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub symbol: String,
    pub state: DirectionalState,
    pub side: OrderSide,
    pub final_note: Decimal,
    pub payload: serde_json::Value,
}

impl DispatchRequest {
    pub fn new(signal: &Signal, side: OrderSide) -> Self {
        Self {
            symbol: signal.symbol.clone(),
            state: signal.state,
            side,
            final_note: signal.final_note,
            payload: signal.payload.clone(),
        }
    }

    /// Signal strength in [0, 1], from the absolute final note
    pub fn strength(&self) -> Decimal {
        clamp(self.final_note.abs(), Decimal::ZERO, Decimal::ONE)
    }

    /// Optional explicit order amount carried in the payload
    pub fn requested_amount(&self) -> Option<Decimal> {
        match self.payload.get("amount")? {
            serde_json::Value::String(raw) => raw.parse().ok(),
            serde_json::Value::Number(num) => num.to_string().parse().ok(),
            _ => None,
        }
    }
}
