use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An open long holding in one symbol.
///
/// `volume` is always a positive multiple of the symbol's lot size; a
/// position that reaches zero is removed from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub volume: i64,
    pub avg_cost_price: f64,
    /// Buy-side commission not yet attributed to a closing trade.
    pub open_commission: f64,
    /// Date and bar index of the most recent buy into this holding.
    pub entry_date: NaiveDate,
    pub entry_bar: usize,
}

impl Position {
    pub fn cost_value(&self) -> f64 {
        self.volume as f64 * self.avg_cost_price
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.volume as f64 * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.volume as f64 * (current_price - self.avg_cost_price)
    }
}
