//! Performance metrics — pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar
//! out. A ratio whose denominator is zero (or whose inputs are empty) is
//! `f64::NAN`, never a panic.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use barreplay_core::domain::TradeRecord;

/// Calendar days per year used to annualise.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Trade-level aggregates for one account variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub all_trades: usize,
    pub win_trades: usize,
    pub loss_trades: usize,
    pub pct_win_per_trade: f64,

    // ── Profit/loss ──
    pub total_profit: f64,
    pub avg_profit: f64,
    pub pct_avg_profit: f64,
    pub total_loss: f64,
    pub avg_loss: f64,
    pub pct_avg_loss: f64,
    /// Expected pnl per trade.
    pub avg_profit_loss: f64,
    /// Expected pct return per trade.
    pub pct_avg_profit_loss: f64,

    // ── Holding ──
    pub avg_bars_held: f64,
    pub avg_win_bars_held: f64,
    pub avg_loss_bars_held: f64,

    // ── Streaks ──
    pub max_win_consecutive: usize,
    pub max_loss_consecutive: usize,
}

impl TradeStats {
    /// Aggregate `trades` in the order given (streaks depend on order).
    pub fn compute(trades: &[TradeRecord]) -> Self {
        let (winners, losers): (Vec<&TradeRecord>, Vec<&TradeRecord>) =
            trades.iter().partition(|t| t.is_winner());

        let pnl = |ts: &[&TradeRecord]| ts.iter().map(|t| t.pnl).collect::<Vec<_>>();
        let pct = |ts: &[&TradeRecord]| ts.iter().map(|t| t.pct_return()).collect::<Vec<_>>();
        let held = |ts: &[&TradeRecord]| ts.iter().map(|t| t.bars_held as f64).collect::<Vec<_>>();

        let pct_avg_profit = mean_or_nan(&pct(&winners));
        let pct_avg_loss = mean_or_nan(&pct(&losers));
        let all: Vec<&TradeRecord> = trades.iter().collect();

        // Empty sides contribute nothing to the expectancy numerator.
        let weighted = |avg: f64, n: usize| if n == 0 { 0.0 } else { avg * n as f64 };

        Self {
            all_trades: trades.len(),
            win_trades: winners.len(),
            loss_trades: losers.len(),
            pct_win_per_trade: ratio(winners.len() as f64, trades.len() as f64),
            total_profit: pnl(&winners).iter().sum(),
            avg_profit: mean_or_nan(&pnl(&winners)),
            pct_avg_profit,
            total_loss: pnl(&losers).iter().sum(),
            avg_loss: mean_or_nan(&pnl(&losers)),
            pct_avg_loss,
            avg_profit_loss: mean_or_nan(&pnl(&all)),
            pct_avg_profit_loss: ratio(
                weighted(pct_avg_profit, winners.len()) + weighted(pct_avg_loss, losers.len()),
                trades.len() as f64,
            ),
            avg_bars_held: mean_or_nan(&held(&all)),
            avg_win_bars_held: mean_or_nan(&held(&winners)),
            avg_loss_bars_held: mean_or_nan(&held(&losers)),
            max_win_consecutive: max_consecutive(trades, true),
            max_loss_consecutive: max_consecutive(trades, false),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// `numerator / denominator`, NaN when the denominator is zero or either
/// side is not finite.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return f64::NAN;
    }
    numerator / denominator
}

/// Years between two dates on a 365.25-day year.
pub fn years_between(start: NaiveDate, end: NaiveDate) -> f64 {
    (end - start).num_days() as f64 / DAYS_PER_YEAR
}

/// Compound annual growth rate from `initial` to `ending` over `years`.
///
/// NaN for a non-positive span or non-positive starting capital.
pub fn cagr(initial: f64, ending: f64, years: f64) -> f64 {
    if years <= 0.0 || initial <= 0.0 || !ending.is_finite() {
        return f64::NAN;
    }
    (ending / initial).powf(1.0 / years) - 1.0
}

/// Largest peak-to-trough decline in currency (≤ 0). NaN for an empty curve.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.is_empty() {
        return f64::NAN;
    }
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        max_dd = max_dd.min(eq - peak);
    }
    max_dd
}

/// Largest peak-to-trough decline as a fraction of the peak (≤ 0).
pub fn pct_max_drawdown(equity_curve: &[f64]) -> f64 {
    if equity_curve.is_empty() {
        return f64::NAN;
    }
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.min(eq / peak - 1.0);
        }
    }
    max_dd
}

/// Annualised standard deviation of bar-to-bar returns: sample std of the
/// returns scaled by √(bars per year).
pub fn annualized_std(equity_curve: &[f64], years: f64) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 || years <= 0.0 {
        return f64::NAN;
    }
    let bars_per_year = equity_curve.len() as f64 / years;
    std_dev(&returns) * bars_per_year.sqrt()
}

/// Fraction of bars whose market value is non-zero.
pub fn exposure(market_values: &[f64]) -> f64 {
    let exposed = market_values.iter().filter(|mv| **mv != 0.0).count();
    ratio(exposed as f64, market_values.len() as f64)
}

/// Mean of market value / equity across bars.
pub fn avg_exposure(market_values: &[f64], equity_curve: &[f64]) -> f64 {
    let fractions: Vec<f64> = market_values
        .iter()
        .zip(equity_curve)
        .map(|(mv, eq)| ratio(*mv, *eq))
        .collect();
    mean_or_nan(&fractions)
}

/// Longest run of consecutive winners (or losers).
pub fn max_consecutive(trades: &[TradeRecord], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;

    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Bar-to-bar simple returns. A non-positive prior value yields NaN.
pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { f64::NAN })
        .collect()
}

pub(crate) fn mean_or_nan(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1).
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let mean = mean_or_nan(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_trade(pnl: f64, bars_held: usize) -> TradeRecord {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        TradeRecord {
            symbol: "AAA".into(),
            entry_bar: 0,
            entry_date: date,
            entry_price: 100.0,
            exit_bar: bars_held,
            exit_date: date,
            exit_price: 100.0 + pnl / 100.0,
            volume: 100,
            commission: 0.0,
            pnl,
            bars_held,
        }
    }

    #[test]
    fn drawdown_pct_and_absolute() {
        let curve = [100.0, 200.0, 100.0, 400.0, 100.0];
        assert!((pct_max_drawdown(&curve) - -0.75).abs() < 1e-12);
        assert_eq!(max_drawdown(&curve), -300.0);
    }

    #[test]
    fn drawdown_monotone_decline() {
        let curve = [100.0, 50.0, 10.0];
        assert!((pct_max_drawdown(&curve) - -0.9).abs() < 1e-12);
        assert_eq!(max_drawdown(&curve), -90.0);
    }

    #[test]
    fn drawdown_rising_curve_is_zero() {
        assert_eq!(pct_max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
        assert!(max_drawdown(&[]).is_nan());
    }

    #[test]
    fn cagr_doubles_over_one_year() {
        let years = years_between(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert!((years - 365.0 / 365.25).abs() < 1e-12);
        assert!((cagr(100.0, 200.0, 1.0) - 1.0).abs() < 1e-12);
        assert!(cagr(100.0, 200.0, 0.0).is_nan());
    }

    #[test]
    fn ratio_guards_zero_denominator() {
        assert!(ratio(1.0, 0.0).is_nan());
        assert!(ratio(f64::NAN, 2.0).is_nan());
        assert_eq!(ratio(1.0, 4.0), 0.25);
    }

    #[test]
    fn exposure_counts_invested_bars() {
        assert_eq!(exposure(&[0.0, 10.0, 10.0, 0.0]), 0.5);
        assert!(exposure(&[]).is_nan());
        assert_eq!(avg_exposure(&[0.0, 50.0], &[100.0, 100.0]), 0.25);
    }

    #[test]
    fn annualized_std_of_flat_curve_is_zero() {
        assert_eq!(annualized_std(&[100.0, 100.0, 100.0], 1.0), 0.0);
        assert!(annualized_std(&[100.0, 101.0], 1.0).is_nan());
    }

    #[test]
    fn trade_stats_split_winners_and_losers() {
        let trades = vec![
            make_trade(100.0, 2),
            make_trade(300.0, 4),
            make_trade(-50.0, 1),
            make_trade(200.0, 3),
            make_trade(-150.0, 5),
            make_trade(-10.0, 6),
        ];
        let s = TradeStats::compute(&trades);
        assert_eq!(s.all_trades, 6);
        assert_eq!(s.win_trades, 3);
        assert_eq!(s.loss_trades, 3);
        assert_eq!(s.pct_win_per_trade, 0.5);
        assert_eq!(s.total_profit, 600.0);
        assert_eq!(s.avg_profit, 200.0);
        assert_eq!(s.total_loss, -210.0);
        assert_eq!(s.avg_loss, -70.0);
        assert!((s.avg_profit_loss - 65.0).abs() < 1e-12);
        assert_eq!(s.avg_win_bars_held, 3.0);
        assert_eq!(s.avg_loss_bars_held, 4.0);
        assert_eq!(s.max_win_consecutive, 2);
        assert_eq!(s.max_loss_consecutive, 2);
        assert!((s.pct_avg_profit - 0.02).abs() < 1e-12);
    }

    #[test]
    fn trade_stats_without_losers_are_nan_not_errors() {
        let s = TradeStats::compute(&[make_trade(10.0, 1)]);
        assert_eq!(s.loss_trades, 0);
        assert!(s.avg_loss.is_nan());
        assert!(s.pct_avg_loss.is_nan());
        assert_eq!(s.total_loss, 0.0);
        assert!((s.pct_avg_profit_loss - 0.001).abs() < 1e-12);

        let empty = TradeStats::compute(&[]);
        assert_eq!(empty.all_trades, 0);
        assert!(empty.pct_win_per_trade.is_nan());
        assert!(empty.avg_bars_held.is_nan());
    }
}
