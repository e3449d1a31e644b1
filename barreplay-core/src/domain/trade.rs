//! TradeRecord — a closed (fully or partially) holding.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A closing trade: one sell matched against the average cost of the
/// holding it reduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,

    // ── Entry ──
    pub entry_bar: usize,
    pub entry_date: NaiveDate,
    /// Average cost price of the holding at exit.
    pub entry_price: f64,

    // ── Exit ──
    pub exit_bar: usize,
    pub exit_date: NaiveDate,
    pub exit_price: f64,

    // ── Size ──
    pub volume: i64,

    // ── PnL ──
    /// Pro-rata buy commission plus the sell commission.
    pub commission: f64,
    pub pnl: f64,

    // ── Duration ──
    pub bars_held: usize,
}

impl TradeRecord {
    /// Return on the trade as a fraction of entry cost.
    pub fn pct_return(&self) -> f64 {
        if self.entry_price == 0.0 || self.volume == 0 {
            return f64::NAN;
        }
        self.pnl / (self.entry_price * self.volume as f64)
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade() -> TradeRecord {
        TradeRecord {
            symbol: "AAA".into(),
            entry_bar: 4,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            entry_price: 100.0,
            exit_bar: 8,
            exit_date: NaiveDate::from_ymd_opt(2024, 1, 11).unwrap(),
            exit_price: 110.0,
            volume: 500,
            commission: 15.0,
            pnl: 4_985.0,
            bars_held: 4,
        }
    }

    #[test]
    fn pct_return_calculation() {
        let trade = sample_trade();
        let expected = 4_985.0 / (100.0 * 500.0);
        assert!((trade.pct_return() - expected).abs() < 1e-12);
    }

    #[test]
    fn is_winner() {
        assert!(sample_trade().is_winner());
        let mut loser = sample_trade();
        loser.pnl = 0.0;
        assert!(!loser.is_winner());
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let trade = sample_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let deser: TradeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, deser);
    }
}
