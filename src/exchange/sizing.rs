use rust_decimal::Decimal;

use crate::domain::OrderSide;
use crate::error::{GateError, Result};
use crate::gate::clamp;

use super::traits::{PositionSizer, SizingRequest};

/// Linear-contract sizing: new exposure is bounded by margin × leverage,
/// and an order against an open position may also close it.
#[derive(Debug, Clone)]
pub struct LinearPositionSizer {
    max_leverage: Decimal,
}

impl LinearPositionSizer {
    pub fn new(max_leverage: Decimal) -> Self {
        Self {
            max_leverage: max_leverage.max(Decimal::ONE),
        }
    }
}

impl Default for LinearPositionSizer {
    fn default() -> Self {
        Self::new(Decimal::from(100))
    }
}

impl PositionSizer for LinearPositionSizer {
    fn max_order_size(&self, request: &SizingRequest) -> Result<Decimal> {
        if request.reference_price <= Decimal::ZERO {
            return Err(GateError::UnknownSymbol(format!(
                "{}: no usable reference price",
                request.symbol
            )));
        }

        let leverage = clamp(request.leverage, Decimal::ONE, self.max_leverage);
        let opening = request.margin_quantity.max(Decimal::ZERO) * leverage / request.reference_price;

        let closing = match request.side {
            OrderSide::Sell if request.holding > Decimal::ZERO => request.holding,
            OrderSide::Buy if request.holding < Decimal::ZERO => -request.holding,
            _ => Decimal::ZERO,
        };

        Ok(opening + closing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(side: OrderSide, holding: Decimal, margin: Decimal, leverage: Decimal) -> SizingRequest {
        SizingRequest {
            symbol: "BTC/USDT:USDT".to_string(),
            side,
            reference_price: dec!(20000),
            holding,
            margin_quantity: margin,
            leverage,
        }
    }

    #[test]
    fn test_capacity_scales_with_leverage() {
        let sizer = LinearPositionSizer::new(dec!(10));
        let size = sizer
            .max_order_size(&request(OrderSide::Buy, Decimal::ZERO, dec!(1000), dec!(4)))
            .unwrap();
        assert_eq!(size, dec!(0.2));

        // Leverage above the cap is clamped
        let size = sizer
            .max_order_size(&request(OrderSide::Buy, Decimal::ZERO, dec!(1000), dec!(50)))
            .unwrap();
        assert_eq!(size, dec!(0.5));
    }

    #[test]
    fn test_opposite_position_adds_closing_size() {
        let sizer = LinearPositionSizer::default();
        let size = sizer
            .max_order_size(&request(OrderSide::Sell, dec!(0.3), Decimal::ZERO, Decimal::ONE))
            .unwrap();
        assert_eq!(size, dec!(0.3));

        let size = sizer
            .max_order_size(&request(OrderSide::Buy, dec!(0.3), Decimal::ZERO, Decimal::ONE))
            .unwrap();
        assert_eq!(size, Decimal::ZERO);
    }

    #[test]
    fn test_zero_price_is_unresolved() {
        let sizer = LinearPositionSizer::default();
        let mut req = request(OrderSide::Buy, Decimal::ZERO, dec!(1000), Decimal::ONE);
        req.reference_price = Decimal::ZERO;
        assert!(sizer.max_order_size(&req).unwrap_err().is_lookup_failure());
    }
}
