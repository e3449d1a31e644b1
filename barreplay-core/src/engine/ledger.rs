//! Account ledger — cash and per-symbol positions for one account variant.
//!
//! The ledger is the only place cash and positions change. Every fill moves
//! cash by exactly `-quantity * price - commission`. Average cost is
//! recomputed on buys only; a sell leaves it unchanged and closes a trade.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Fill, PortfolioSnapshot, Position, PositionDetail, TradeRecord};

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("insufficient funds for {symbol} on {date}: cash {cash} would become {resulting}")]
    InsufficientFunds {
        symbol: String,
        date: NaiveDate,
        cash: f64,
        resulting: f64,
    },

    #[error("cannot sell {requested} {symbol} on {date}: holding {held}")]
    InsufficientPosition {
        symbol: String,
        date: NaiveDate,
        requested: i64,
        held: i64,
    },
}

/// Instantaneous valuation of the holdings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Valuation {
    pub market_value: f64,
    pub cost_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountLedger {
    cash: f64,
    positions: BTreeMap<String, Position>,
    total_commission: f64,
    total_dividends: f64,
}

impl AccountLedger {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            positions: BTreeMap::new(),
            total_commission: 0.0,
            total_dividends: 0.0,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn volume(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).map_or(0, |p| p.volume)
    }

    /// Average cost price, or 0.0 when flat.
    pub fn cost_price(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.avg_cost_price)
    }

    pub fn total_commission(&self) -> f64 {
        self.total_commission
    }

    pub fn total_dividends(&self) -> f64 {
        self.total_dividends
    }

    /// Apply one fill. Returns the closing trade for sells.
    ///
    /// State is left untouched when an error is returned. Both errors mean
    /// the matcher let an infeasible fill through.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<Option<TradeRecord>, LedgerError> {
        if fill.quantity == 0 {
            return Ok(None);
        }

        let held = self.volume(&fill.symbol);
        if fill.quantity < 0 && -fill.quantity > held {
            return Err(LedgerError::InsufficientPosition {
                symbol: fill.symbol.clone(),
                date: fill.date,
                requested: -fill.quantity,
                held,
            });
        }

        let resulting = self.cash - fill.quantity as f64 * fill.price - fill.commission;
        if resulting < 0.0 {
            return Err(LedgerError::InsufficientFunds {
                symbol: fill.symbol.clone(),
                date: fill.date,
                cash: self.cash,
                resulting,
            });
        }
        self.cash = resulting;
        self.total_commission += fill.commission;

        if fill.quantity > 0 {
            self.apply_buy(fill);
            Ok(None)
        } else {
            Ok(self.apply_sell(fill))
        }
    }

    fn apply_buy(&mut self, fill: &Fill) {
        match self.positions.get_mut(&fill.symbol) {
            Some(pos) => {
                let total_cost = pos.cost_value() + fill.quantity as f64 * fill.price;
                pos.volume += fill.quantity;
                pos.avg_cost_price = total_cost / pos.volume as f64;
                pos.open_commission += fill.commission;
                pos.entry_date = fill.date;
                pos.entry_bar = fill.bar_index;
            }
            None => {
                self.positions.insert(
                    fill.symbol.clone(),
                    Position {
                        symbol: fill.symbol.clone(),
                        volume: fill.quantity,
                        avg_cost_price: fill.price,
                        open_commission: fill.commission,
                        entry_date: fill.date,
                        entry_bar: fill.bar_index,
                    },
                );
            }
        }
    }

    fn apply_sell(&mut self, fill: &Fill) -> Option<TradeRecord> {
        let pos = self.positions.get_mut(&fill.symbol)?;
        let sold = -fill.quantity;
        let attributed = pos.open_commission * sold as f64 / pos.volume as f64;
        let commission = attributed + fill.commission;
        let trade = TradeRecord {
            symbol: fill.symbol.clone(),
            entry_bar: pos.entry_bar,
            entry_date: pos.entry_date,
            entry_price: pos.avg_cost_price,
            exit_bar: fill.bar_index,
            exit_date: fill.date,
            exit_price: fill.price,
            volume: sold,
            commission,
            pnl: (fill.price - pos.avg_cost_price) * sold as f64 - commission,
            bars_held: fill.bar_index.saturating_sub(pos.entry_bar),
        };

        pos.open_commission -= attributed;
        pos.volume -= sold;
        if pos.volume == 0 {
            self.positions.remove(&fill.symbol);
        }
        Some(trade)
    }

    /// Credit `volume × dividend_per_share` for a held symbol. Returns the
    /// amount credited (0.0 when flat).
    pub fn receive_dividend(&mut self, symbol: &str, dividend_per_share: f64) -> f64 {
        let amount = self.dividend_entitlement(symbol, dividend_per_share);
        self.credit_dividend(amount);
        amount
    }

    /// Cash owed on the current holding of `symbol`, without crediting it.
    pub fn dividend_entitlement(&self, symbol: &str, dividend_per_share: f64) -> f64 {
        let volume = self.volume(symbol);
        if volume == 0 || !dividend_per_share.is_finite() {
            return 0.0;
        }
        volume as f64 * dividend_per_share
    }

    /// Book dividend cash fixed earlier, e.g. at the ex-date.
    pub fn credit_dividend(&mut self, amount: f64) {
        if amount.is_finite() && amount != 0.0 {
            self.cash += amount;
            self.total_dividends += amount;
        }
    }

    /// Value holdings at `prices`; a symbol with no price is valued at cost.
    pub fn mark_to_market(&self, prices: &BTreeMap<String, f64>) -> Valuation {
        self.positions
            .iter()
            .fold(Valuation::default(), |acc, (symbol, pos)| {
                let price = price_or_cost(prices, symbol, pos);
                Valuation {
                    market_value: acc.market_value + pos.market_value(price),
                    cost_value: acc.cost_value + pos.cost_value(),
                }
            })
    }

    pub fn equity(&self, prices: &BTreeMap<String, f64>) -> f64 {
        self.cash + self.mark_to_market(prices).market_value
    }

    pub fn snapshot(
        &self,
        date: NaiveDate,
        prices: &BTreeMap<String, f64>,
        commission: f64,
        dividend: f64,
    ) -> PortfolioSnapshot {
        let valuation = self.mark_to_market(prices);
        let positions = self
            .positions
            .iter()
            .map(|(symbol, pos)| {
                let close_price = price_or_cost(prices, symbol, pos);
                PositionDetail {
                    symbol: symbol.clone(),
                    volume: pos.volume,
                    avg_cost_price: pos.avg_cost_price,
                    close_price,
                    market_value: pos.market_value(close_price),
                    cost_value: pos.cost_value(),
                }
            })
            .collect();

        PortfolioSnapshot {
            date,
            cash: self.cash,
            total_market_value: valuation.market_value,
            total_cost_value: valuation.cost_value,
            commission,
            dividend,
            positions,
        }
    }
}

fn price_or_cost(prices: &BTreeMap<String, f64>, symbol: &str, pos: &Position) -> f64 {
    prices
        .get(symbol)
        .copied()
        .filter(|p| p.is_finite())
        .unwrap_or(pos.avg_cost_price)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn fill(symbol: &str, quantity: i64, price: f64, commission: f64, bar: usize) -> Fill {
        Fill {
            symbol: symbol.into(),
            date: date(2 + bar as u32),
            bar_index: bar,
            quantity,
            price,
            commission,
        }
    }

    #[test]
    fn buy_debits_cash_and_opens_position() {
        let mut ledger = AccountLedger::new(1_000_000.0);
        let trade = ledger.apply_fill(&fill("AAA", 400, 100.0, 100.0, 0)).unwrap();
        assert!(trade.is_none());
        assert_eq!(ledger.cash(), 959_900.0);
        assert_eq!(ledger.volume("AAA"), 400);
        assert_eq!(ledger.cost_price("AAA"), 100.0);
    }

    #[test]
    fn weighted_average_cost_on_buys_only() {
        let mut ledger = AccountLedger::new(1_000_000.0);
        ledger.apply_fill(&fill("AAA", 100, 10.0, 0.0, 0)).unwrap();
        ledger.apply_fill(&fill("AAA", 300, 20.0, 0.0, 1)).unwrap();
        assert_eq!(ledger.cost_price("AAA"), 17.5);

        ledger.apply_fill(&fill("AAA", -200, 30.0, 0.0, 2)).unwrap();
        assert_eq!(ledger.cost_price("AAA"), 17.5);
        assert_eq!(ledger.volume("AAA"), 200);
    }

    #[test]
    fn sell_closes_trade_with_attributed_commission() {
        let mut ledger = AccountLedger::new(100_000.0);
        ledger.apply_fill(&fill("AAA", 400, 100.0, 40.0, 0)).unwrap();
        let trade = ledger
            .apply_fill(&fill("AAA", -100, 110.0, 11.0, 3))
            .unwrap()
            .unwrap();
        assert_eq!(trade.volume, 100);
        assert_eq!(trade.entry_price, 100.0);
        assert_eq!(trade.exit_price, 110.0);
        assert!((trade.commission - 21.0).abs() < 1e-10);
        assert!((trade.pnl - 979.0).abs() < 1e-10);
        assert_eq!(trade.bars_held, 3);
        assert!((ledger.position("AAA").unwrap().open_commission - 30.0).abs() < 1e-10);
    }

    #[test]
    fn full_exit_removes_position() {
        let mut ledger = AccountLedger::new(10_000.0);
        ledger.apply_fill(&fill("AAA", 100, 10.0, 0.0, 0)).unwrap();
        ledger.apply_fill(&fill("AAA", -100, 12.0, 0.0, 1)).unwrap();
        assert!(ledger.position("AAA").is_none());
        assert_eq!(ledger.cash(), 10_200.0);
    }

    #[test]
    fn overspend_is_rejected_without_mutation() {
        let mut ledger = AccountLedger::new(1_000.0);
        let err = ledger.apply_fill(&fill("AAA", 100, 10.0, 1.0, 0)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(ledger.cash(), 1_000.0);
        assert!(ledger.positions().is_empty());
    }

    #[test]
    fn oversell_is_rejected() {
        let mut ledger = AccountLedger::new(10_000.0);
        ledger.apply_fill(&fill("AAA", 100, 10.0, 0.0, 0)).unwrap();
        let err = ledger.apply_fill(&fill("AAA", -200, 10.0, 0.0, 1)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientPosition {
                symbol: "AAA".into(),
                date: date(3),
                requested: 200,
                held: 100,
            }
        );
    }

    #[test]
    fn dividend_credits_held_volume_only() {
        let mut ledger = AccountLedger::new(10_000.0);
        assert_eq!(ledger.receive_dividend("AAA", 1.5), 0.0);
        ledger.apply_fill(&fill("AAA", 200, 10.0, 0.0, 0)).unwrap();
        assert_eq!(ledger.receive_dividend("AAA", 1.5), 300.0);
        assert_eq!(ledger.cash(), 8_300.0);
        assert_eq!(ledger.total_dividends(), 300.0);
    }

    #[test]
    fn entitlement_is_fixed_before_the_credit() {
        let mut ledger = AccountLedger::new(10_000.0);
        ledger.apply_fill(&fill("AAA", 200, 10.0, 0.0, 0)).unwrap();
        let owed = ledger.dividend_entitlement("AAA", 2.0);
        assert_eq!(owed, 400.0);
        assert_eq!(ledger.cash(), 8_000.0);

        // Selling after the ex-date does not change what is owed.
        ledger.apply_fill(&fill("AAA", -200, 10.0, 0.0, 1)).unwrap();
        ledger.credit_dividend(owed);
        assert_eq!(ledger.cash(), 10_400.0);
        assert_eq!(ledger.total_dividends(), 400.0);
    }

    #[test]
    fn mark_to_market_falls_back_to_cost() {
        let mut ledger = AccountLedger::new(100_000.0);
        ledger.apply_fill(&fill("AAA", 100, 10.0, 0.0, 0)).unwrap();
        ledger.apply_fill(&fill("BBB", 200, 20.0, 0.0, 0)).unwrap();
        let prices = BTreeMap::from([("AAA".to_string(), 12.0)]);
        let v = ledger.mark_to_market(&prices);
        assert_eq!(v.market_value, 1_200.0 + 4_000.0);
        assert_eq!(v.cost_value, 1_000.0 + 4_000.0);

        let snap = ledger.snapshot(date(2), &prices, 0.0, 0.0);
        assert_eq!(snap.positions.len(), 2);
        assert_eq!(snap.positions[0].symbol, "AAA");
        assert_eq!(snap.equity(), ledger.equity(&prices));
    }
}
