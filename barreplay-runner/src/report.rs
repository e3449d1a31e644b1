//! Performance report — per-variant statistics over a simulation's history.
//!
//! Generated from a [`SimulationResult`] without touching any ledger.
//! Positions still open after the last bar are closed on paper at the last
//! close, with no exit commission, so trade statistics cover every holding.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use barreplay_core::domain::{PortfolioSnapshot, Position, TradeRecord};
use barreplay_core::engine::{CostModel, SimulationResult, VariantResult};

use crate::metrics::{self, TradeStats};

/// Headline statistics for one account variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub initial_capital: f64,
    pub ending_capital: f64,
    pub net_profit: f64,
    pub pct_net_profit: f64,
    pub cagr: f64,
    pub maximum_drawdown: f64,
    pub pct_maximum_drawdown: f64,
    pub cagr_divided_maxdd: f64,
    pub std: f64,
    pub cagr_divided_std: f64,
    /// Fraction of bars holding any position.
    pub pct_exposure: f64,
    /// Mean fraction of equity held in positions.
    pub avg_exposure: f64,
    pub total_commission: f64,
    pub total_dividend: f64,
    pub pct_commission: f64,
    pub pct_buy_slip: f64,
    pub pct_sell_slip: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub date: NaiveDate,
    pub equity: f64,
    pub peak: f64,
    pub drawdown: f64,
    pub pct_drawdown: f64,
}

/// Portfolio return over one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub start_equity: f64,
    pub end_equity: f64,
    pub pct_return: f64,
}

/// Realised pnl for one symbol in one calendar month (by exit date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySymbolPnl {
    pub year: i32,
    pub month: u32,
    pub symbol: String,
    pub trades: usize,
    pub pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantReport {
    pub summary: SummaryStats,
    pub trade_stats: TradeStats,
    /// Closing trades in exit order, followed by the end-of-run paper closes.
    pub trades: Vec<TradeRecord>,
    pub drawdown: Vec<DrawdownPoint>,
    pub monthly_returns: Vec<MonthlyReturn>,
    pub monthly_pnl_by_symbol: Vec<MonthlySymbolPnl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub without_dividend: VariantReport,
    pub with_dividend: Option<VariantReport>,
}

impl PerformanceReport {
    pub fn generate(result: &SimulationResult, cost: &CostModel) -> Self {
        let build = |variant: &VariantResult| {
            VariantReport::generate(variant, result, cost)
        };
        Self {
            without_dividend: build(&result.without_dividend),
            with_dividend: result.with_dividend.as_ref().map(build),
        }
    }
}

impl VariantReport {
    pub fn generate(variant: &VariantResult, result: &SimulationResult, cost: &CostModel) -> Self {
        let snapshots = &variant.snapshots;
        let equity: Vec<f64> = snapshots.iter().map(PortfolioSnapshot::equity).collect();
        let market_values: Vec<f64> = snapshots.iter().map(|s| s.total_market_value).collect();

        let trades: Vec<TradeRecord> = variant
            .trades
            .iter()
            .cloned()
            .chain(paper_closes(variant, result))
            .collect();

        Self {
            summary: summarize(snapshots, &equity, &market_values, variant, result.initial_cash, cost),
            trade_stats: TradeStats::compute(&trades),
            drawdown: drawdown_series(snapshots),
            monthly_returns: monthly_returns(snapshots, result.initial_cash),
            monthly_pnl_by_symbol: monthly_pnl_by_symbol(&trades),
            trades,
        }
    }
}

fn summarize(
    snapshots: &[PortfolioSnapshot],
    equity: &[f64],
    market_values: &[f64],
    variant: &VariantResult,
    initial_capital: f64,
    cost: &CostModel,
) -> SummaryStats {
    let start_date = snapshots.first().map(|s| s.date);
    let end_date = snapshots.last().map(|s| s.date);
    let years = match (start_date, end_date) {
        (Some(start), Some(end)) => metrics::years_between(start, end),
        _ => 0.0,
    };

    let ending_capital = equity.last().copied().unwrap_or(initial_capital);
    let net_profit = ending_capital - initial_capital;
    let cagr = metrics::cagr(initial_capital, ending_capital, years);
    let pct_maximum_drawdown = metrics::pct_max_drawdown(equity);
    let std = metrics::annualized_std(equity, years);

    SummaryStats {
        start_date,
        end_date,
        initial_capital,
        ending_capital,
        net_profit,
        pct_net_profit: metrics::ratio(net_profit, initial_capital),
        cagr,
        maximum_drawdown: metrics::max_drawdown(equity),
        pct_maximum_drawdown,
        cagr_divided_maxdd: metrics::ratio(cagr, pct_maximum_drawdown.abs()),
        std,
        cagr_divided_std: metrics::ratio(cagr, std),
        pct_exposure: metrics::exposure(market_values),
        avg_exposure: metrics::avg_exposure(market_values, equity),
        total_commission: variant.total_commission,
        total_dividend: variant.dividends.iter().map(|d| d.amount).sum(),
        pct_commission: cost.pct_commission,
        pct_buy_slip: cost.pct_buy_slip,
        pct_sell_slip: cost.pct_sell_slip,
    }
}

/// Close every open position at the last close with no exit commission.
fn paper_closes(variant: &VariantResult, result: &SimulationResult) -> Vec<TradeRecord> {
    let (Some(&exit_date), Some(exit_bar)) = (
        result.calendar.last(),
        result.calendar.len().checked_sub(1),
    ) else {
        return Vec::new();
    };
    variant
        .open_positions
        .iter()
        .map(|pos: &Position| {
            let exit_price = result
                .last_close
                .get(&pos.symbol)
                .copied()
                .unwrap_or(pos.avg_cost_price);
            let commission = pos.open_commission;
            TradeRecord {
                symbol: pos.symbol.clone(),
                entry_bar: pos.entry_bar,
                entry_date: pos.entry_date,
                entry_price: pos.avg_cost_price,
                exit_bar,
                exit_date,
                exit_price,
                volume: pos.volume,
                commission,
                pnl: (exit_price - pos.avg_cost_price) * pos.volume as f64 - commission,
                bars_held: exit_bar.saturating_sub(pos.entry_bar),
            }
        })
        .collect()
}

pub fn drawdown_series(snapshots: &[PortfolioSnapshot]) -> Vec<DrawdownPoint> {
    let mut peak = f64::NEG_INFINITY;
    snapshots
        .iter()
        .map(|s| {
            let equity = s.equity();
            peak = peak.max(equity);
            DrawdownPoint {
                date: s.date,
                equity,
                peak,
                drawdown: equity - peak,
                pct_drawdown: metrics::ratio(equity, peak) - 1.0,
            }
        })
        .collect()
}

/// Month-end over previous month-end equity; the first month is measured
/// from `initial_capital`.
pub fn monthly_returns(snapshots: &[PortfolioSnapshot], initial_capital: f64) -> Vec<MonthlyReturn> {
    let mut month_end: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for s in snapshots {
        month_end.insert((s.date.year(), s.date.month()), s.equity());
    }

    let mut previous = initial_capital;
    month_end
        .into_iter()
        .map(|((year, month), end_equity)| {
            let row = MonthlyReturn {
                year,
                month,
                start_equity: previous,
                end_equity,
                pct_return: metrics::ratio(end_equity, previous) - 1.0,
            };
            previous = end_equity;
            row
        })
        .collect()
}

pub fn monthly_pnl_by_symbol(trades: &[TradeRecord]) -> Vec<MonthlySymbolPnl> {
    let mut buckets: BTreeMap<(i32, u32, &str), (usize, f64)> = BTreeMap::new();
    for t in trades {
        let key = (t.exit_date.year(), t.exit_date.month(), t.symbol.as_str());
        let entry = buckets.entry(key).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += t.pnl;
    }
    buckets
        .into_iter()
        .map(|((year, month, symbol), (trades, pnl))| MonthlySymbolPnl {
            year,
            month,
            symbol: symbol.to_string(),
            trades,
            pnl,
        })
        .collect()
}
