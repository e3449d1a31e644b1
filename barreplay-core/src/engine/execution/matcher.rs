//! Order matcher — turns a requested signed quantity into a feasible fill.
//!
//! Steps: base price from the price-match mode, directional slippage,
//! clip (sells to held volume, buys to affordable cash), round toward zero
//! to a lot multiple, then commission. A zero fill is a normal outcome.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Fill, OrderSide};

use super::ExecutionConfig;

/// Tolerance, in lots, for floating noise in requested quantities
/// (e.g. 3.9999999999 lots from a percent-of-portfolio helper).
const LOT_EPSILON: f64 = 1e-9;

/// Account state the matcher clips against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Availability {
    pub cash: f64,
    pub held_volume: i64,
    pub lot_size: i64,
}

/// Result of matching one order. `quantity` is signed and may be zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub quantity: i64,
    pub price: f64,
    pub commission: f64,
}

impl MatchResult {
    fn zero(price: f64) -> Self {
        Self {
            quantity: 0,
            price,
            commission: 0.0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.quantity == 0
    }

    pub fn side(&self) -> Option<OrderSide> {
        match self.quantity {
            0 => None,
            q if q > 0 => Some(OrderSide::Buy),
            _ => Some(OrderSide::Sell),
        }
    }

    /// Cash leaving the account if this result is settled.
    pub fn cash_outflow(&self) -> f64 {
        self.quantity as f64 * self.price + self.commission
    }

    pub fn into_fill(self, symbol: &str, bar: &Bar, bar_index: usize) -> Option<Fill> {
        if self.is_zero() {
            return None;
        }
        Some(Fill {
            symbol: symbol.to_string(),
            date: bar.date,
            bar_index,
            quantity: self.quantity,
            price: self.price,
            commission: self.commission,
        })
    }
}

/// Stateless matcher; borrows the execution configuration.
#[derive(Debug, Clone, Copy)]
pub struct OrderMatcher<'a> {
    config: &'a ExecutionConfig,
}

impl<'a> OrderMatcher<'a> {
    pub fn new(config: &'a ExecutionConfig) -> Self {
        Self { config }
    }

    pub fn match_order(&self, requested: f64, bar: &Bar, avail: Availability) -> MatchResult {
        let side = if requested > 0.0 {
            OrderSide::Buy
        } else if requested < 0.0 {
            OrderSide::Sell
        } else {
            // Zero and NaN requests.
            return MatchResult::zero(0.0);
        };

        let base = self.config.price_match.base_price(bar);
        if !base.is_finite() || base <= 0.0 {
            return MatchResult::zero(0.0);
        }
        let price = self.config.cost_model.apply_slippage(base, side);
        if !price.is_finite() || price <= 0.0 {
            return MatchResult::zero(0.0);
        }

        let lot = avail.lot_size.max(1);
        let quantity = match side {
            OrderSide::Sell => {
                let held = avail.held_volume.max(0) as f64;
                -round_to_lot(requested.abs().min(held), lot)
            }
            OrderSide::Buy => self.affordable(requested, price, avail.cash, lot),
        };

        if quantity == 0 {
            return MatchResult::zero(price);
        }
        MatchResult {
            quantity,
            price,
            commission: self.config.cost_model.commission(price, quantity),
        }
    }

    fn affordable(&self, requested: f64, price: f64, cash: f64, lot: i64) -> i64 {
        if cash <= 0.0 {
            return 0;
        }
        let pct_commission = self.config.cost_model.pct_commission;
        let lot_f = lot as f64;
        let max_affordable = (cash / (price * (1.0 + pct_commission)) / lot_f).floor() * lot_f;
        let mut quantity = round_to_lot(requested.min(max_affordable), lot);
        // Mirrors the ledger's settlement arithmetic exactly.
        while quantity > 0 {
            let commission = self.config.cost_model.commission(price, quantity);
            if cash - quantity as f64 * price - commission >= 0.0 {
                break;
            }
            quantity -= lot;
        }
        quantity.max(0)
    }
}

/// Round a non-negative quantity down to a multiple of `lot`.
fn round_to_lot(quantity: f64, lot: i64) -> i64 {
    if !quantity.is_finite() || quantity <= 0.0 {
        return 0;
    }
    let lots = (quantity / lot as f64 + LOT_EPSILON).floor();
    if lots >= i64::MAX as f64 / lot as f64 {
        return 0;
    }
    lots as i64 * lot
}
