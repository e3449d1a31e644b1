//! Per-bar portfolio snapshots recorded by the engine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Mark-to-market detail for one held symbol at the end of a bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionDetail {
    pub symbol: String,
    pub volume: i64,
    pub avg_cost_price: f64,
    pub close_price: f64,
    pub market_value: f64,
    pub cost_value: f64,
}

/// End-of-bar state of one ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub date: NaiveDate,
    pub cash: f64,
    pub total_market_value: f64,
    pub total_cost_value: f64,
    /// Commission paid on this bar's fills.
    pub commission: f64,
    /// Dividend cash credited on this bar.
    pub dividend: f64,
    pub positions: Vec<PositionDetail>,
}

impl PortfolioSnapshot {
    /// Cash plus the market value of all holdings.
    pub fn equity(&self) -> f64 {
        self.cash + self.total_market_value
    }

    pub fn has_exposure(&self) -> bool {
        self.total_market_value != 0.0
    }
}

/// A dividend credited to the with-dividend ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendRecord {
    pub symbol: String,
    pub ex_date: NaiveDate,
    pub pay_date: Option<NaiveDate>,
    pub volume: i64,
    pub dividend_per_share: f64,
    pub amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equity_adds_cash_and_market_value() {
        let snap = PortfolioSnapshot {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            cash: 959_900.0,
            total_market_value: 42_000.0,
            total_cost_value: 40_000.0,
            commission: 100.0,
            dividend: 0.0,
            positions: Vec::new(),
        };
        assert_eq!(snap.equity(), 1_001_900.0);
        assert!(snap.has_exposure());
    }
}
