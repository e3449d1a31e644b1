//! Decision context and order intents.
//!
//! The engine hands the caller's decision function an immutable [`Context`]
//! per symbol per bar. The function answers with an [`OrderIntent`], which
//! the engine resolves to a signed quantity against the context's reference
//! price before it reaches the order matcher.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::SignalValue;

/// Error type a decision function may return.
pub type DecisionError = Box<dyn std::error::Error + Send + Sync>;

/// Read-only view of the primary ledger for one symbol on one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub symbol: String,
    pub timestamp: NaiveDate,
    pub bar_index: usize,
    /// Delayed signal for this symbol.
    pub signal: SignalValue,
    pub cash: f64,
    /// Volume held in this symbol.
    pub volume: i64,
    /// Average cost price of the holding (0.0 when flat).
    pub cost_price: f64,
    /// Reference price: last close observable before this bar executes.
    pub close_price: f64,
    pub total_market_value: f64,
    pub total_cost_value: f64,
    /// Cash plus total market value.
    pub port_value: f64,
}

impl Context {
    fn shares_for(&self, value: f64) -> f64 {
        if !self.close_price.is_finite() || self.close_price <= 0.0 {
            return 0.0;
        }
        value / self.close_price
    }

    // ── Buy helpers ──

    pub fn buy_pct_port(&self, pct: f64) -> f64 {
        self.shares_for(self.port_value * pct)
    }

    pub fn buy_value(&self, value: f64) -> f64 {
        self.shares_for(value)
    }

    pub fn buy_pct_position(&self, pct: f64) -> f64 {
        self.volume as f64 * pct
    }

    // ── Sell helpers ──

    pub fn sell_pct_port(&self, pct: f64) -> f64 {
        -self.buy_pct_port(pct)
    }

    pub fn sell_value(&self, value: f64) -> f64 {
        -self.buy_value(value)
    }

    pub fn sell_pct_position(&self, pct: f64) -> f64 {
        -self.buy_pct_position(pct)
    }

    // ── Targets ──

    /// Quantity that brings the holding to `pct` of portfolio value.
    pub fn target_pct_port(&self, pct: f64) -> f64 {
        self.buy_pct_port(pct) - self.volume as f64
    }

    /// Quantity that brings the holding to `value` in currency.
    pub fn target_value(&self, value: f64) -> f64 {
        self.buy_value(value) - self.volume as f64
    }
}

/// What the decision function wants done. Percentages are fractions
/// (0.1 = 10%) and signed: positive buys, negative sells.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OrderIntent {
    #[default]
    None,
    Quantity(f64),
    PctPort(f64),
    Value(f64),
    PctPosition(f64),
    TargetPctPort(f64),
    TargetValue(f64),
}

impl OrderIntent {
    /// Signed quantity this intent asks for in `ctx`. Non-finite results
    /// resolve to 0.0.
    pub fn resolve(&self, ctx: &Context) -> f64 {
        let quantity = match *self {
            OrderIntent::None => 0.0,
            OrderIntent::Quantity(q) => q,
            OrderIntent::PctPort(pct) => ctx.buy_pct_port(pct),
            OrderIntent::Value(value) => ctx.buy_value(value),
            OrderIntent::PctPosition(pct) => ctx.buy_pct_position(pct),
            OrderIntent::TargetPctPort(pct) => ctx.target_pct_port(pct),
            OrderIntent::TargetValue(value) => ctx.target_value(value),
        };
        if quantity.is_finite() {
            quantity
        } else {
            0.0
        }
    }
}

impl From<f64> for OrderIntent {
    fn from(quantity: f64) -> Self {
        OrderIntent::Quantity(quantity)
    }
}

impl From<i64> for OrderIntent {
    fn from(quantity: i64) -> Self {
        OrderIntent::Quantity(quantity as f64)
    }
}

/// Caller strategy invoked once per symbol per bar.
pub trait DecisionFunction {
    fn decide(&mut self, ctx: &Context) -> Result<OrderIntent, DecisionError>;
}

impl<F> DecisionFunction for F
where
    F: FnMut(&Context) -> Result<OrderIntent, DecisionError>,
{
    fn decide(&mut self, ctx: &Context) -> Result<OrderIntent, DecisionError> {
        self(ctx)
    }
}

/// Pin a closure to the decision-function signature so its argument and
/// error types are inferred.
pub fn decision_fn<F>(f: F) -> F
where
    F: FnMut(&Context) -> Result<OrderIntent, DecisionError>,
{
    f
}
