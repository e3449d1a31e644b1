//! Property tests for the report's equity-curve derivations.

use barreplay_core::domain::PortfolioSnapshot;
use barreplay_runner::metrics::{max_drawdown, pct_max_drawdown};
use barreplay_runner::report::{drawdown_series, monthly_returns};
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

fn snapshots(equity: &[f64]) -> Vec<PortfolioSnapshot> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    equity
        .iter()
        .enumerate()
        .map(|(i, &cash)| PortfolioSnapshot {
            // Every fifth calendar day, so curves span several months.
            date: start + Duration::days(5 * i as i64),
            cash,
            total_market_value: 0.0,
            total_cost_value: 0.0,
            commission: 0.0,
            dividend: 0.0,
            positions: Vec::new(),
        })
        .collect()
}

proptest! {
    #[test]
    fn drawdown_series_agrees_with_max_drawdown(
        equity in prop::collection::vec(1.0..1e6_f64, 1..120)
    ) {
        let series = drawdown_series(&snapshots(&equity));
        prop_assert_eq!(series.len(), equity.len());

        let deepest = series.iter().map(|p| p.drawdown).fold(0.0_f64, f64::min);
        prop_assert!((deepest - max_drawdown(&equity)).abs() < 1e-6);

        let deepest_pct = series.iter().map(|p| p.pct_drawdown).fold(0.0_f64, f64::min);
        prop_assert!((deepest_pct - pct_max_drawdown(&equity)).abs() < 1e-9);

        for p in &series {
            prop_assert!(p.drawdown <= 0.0);
            prop_assert!(p.peak >= p.equity);
        }
    }

    #[test]
    fn monthly_returns_compound_to_total_return(
        equity in prop::collection::vec(1.0..1e6_f64, 1..120),
        initial in 1.0..1e6_f64,
    ) {
        let months = monthly_returns(&snapshots(&equity), initial);
        let compounded: f64 = months.iter().map(|m| 1.0 + m.pct_return).product();
        let total = equity[equity.len() - 1] / initial;
        prop_assert!((compounded / total - 1.0).abs() < 1e-6);

        for pair in months.windows(2) {
            prop_assert_eq!(pair[0].end_equity, pair[1].start_equity);
            prop_assert!((pair[0].year, pair[0].month) < (pair[1].year, pair[1].month));
        }
    }
}
