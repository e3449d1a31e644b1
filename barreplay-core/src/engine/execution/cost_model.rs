//! Cost model — slippage and commission as fractions of traded value.
//!
//! Slippage is directional: buyers pay more, sellers receive less.
//! Commission is a cost on both sides.

use serde::{Deserialize, Serialize};

use crate::domain::OrderSide;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Commission as a fraction of traded value (0.0025 = 0.25%).
    pub pct_commission: f64,
    pub pct_buy_slip: f64,
    pub pct_sell_slip: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::frictionless()
    }
}

impl CostModel {
    pub fn new(pct_commission: f64, pct_buy_slip: f64, pct_sell_slip: f64) -> Self {
        Self {
            pct_commission,
            pct_buy_slip,
            pct_sell_slip,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn apply_slippage(&self, base_price: f64, side: OrderSide) -> f64 {
        match side {
            OrderSide::Buy => base_price * (1.0 + self.pct_buy_slip),
            OrderSide::Sell => base_price * (1.0 - self.pct_sell_slip),
        }
    }

    /// Commission on a fill of `quantity` (either sign) at `price`.
    pub fn commission(&self, price: f64, quantity: i64) -> f64 {
        quantity.unsigned_abs() as f64 * price * self.pct_commission
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frictionless_is_identity() {
        let cost = CostModel::frictionless();
        assert_eq!(cost.apply_slippage(100.0, OrderSide::Buy), 100.0);
        assert_eq!(cost.apply_slippage(100.0, OrderSide::Sell), 100.0);
        assert_eq!(cost.commission(100.0, 400), 0.0);
    }

    #[test]
    fn slippage_is_directional() {
        let cost = CostModel::new(0.0, 0.01, 0.02);
        assert!((cost.apply_slippage(100.0, OrderSide::Buy) - 101.0).abs() < 1e-10);
        assert!((cost.apply_slippage(100.0, OrderSide::Sell) - 98.0).abs() < 1e-10);
    }

    #[test]
    fn commission_ignores_sign() {
        let cost = CostModel::new(0.0025, 0.0, 0.0);
        assert!((cost.commission(100.0, 400) - 100.0).abs() < 1e-10);
        assert!((cost.commission(100.0, -400) - 100.0).abs() < 1e-10);
    }
}
