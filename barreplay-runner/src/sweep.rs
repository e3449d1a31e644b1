//! Parameter sweeps over execution settings, optionally in parallel.

use std::cmp::Ordering;
use std::collections::HashMap;

use anyhow::{Context as _, Result};
use rayon::prelude::*;
use tracing::info;

use barreplay_core::domain::SignalMatrix;
use barreplay_core::engine::{DecisionFunction, MarketData, PriceMatchMode};

use crate::config::BacktestConfig;
use crate::runner::{run_backtest, BacktestResult};

/// Grid of execution settings to sweep.
///
/// An empty dimension keeps the base config's value.
#[derive(Debug, Clone, Default)]
pub struct ParamGrid {
    pub pct_commissions: Vec<f64>,
    pub signal_delays: Vec<usize>,
    pub price_matches: Vec<PriceMatchMode>,
    pub initial_cashes: Vec<f64>,
}

impl ParamGrid {
    /// Returns the total number of configurations in this grid.
    pub fn size(&self) -> usize {
        self.pct_commissions.len().max(1)
            * self.signal_delays.len().max(1)
            * self.price_matches.len().max(1)
            * self.initial_cashes.len().max(1)
    }

    /// Generates all configurations in the grid, in nested dimension order.
    pub fn generate_configs(&self, base: &BacktestConfig) -> Vec<BacktestConfig> {
        let commissions = or_base(&self.pct_commissions, base.execution.pct_commission);
        let delays = or_base(&self.signal_delays, base.backtest.signal_delay);
        let modes = or_base(&self.price_matches, base.execution.price_match);
        let cashes = or_base(&self.initial_cashes, base.backtest.initial_cash);

        let mut configs = Vec::with_capacity(self.size());
        for &commission in &commissions {
            for &delay in &delays {
                for &mode in &modes {
                    for &cash in &cashes {
                        let mut config = base.clone();
                        config.execution.pct_commission = commission;
                        config.backtest.signal_delay = delay;
                        config.execution.price_match = mode;
                        config.backtest.initial_cash = cash;
                        configs.push(config);
                    }
                }
            }
        }
        configs
    }
}

fn or_base<T: Copy>(values: &[T], base: T) -> Vec<T> {
    if values.is_empty() {
        vec![base]
    } else {
        values.to_vec()
    }
}

/// Parameter sweep executor.
///
/// Every run shares the read-only inputs and owns its ledgers. The decision
/// function factory is called once per run so no decision state leaks
/// between configurations.
pub struct ParamSweep<'a> {
    signals: &'a SignalMatrix,
    market: &'a MarketData,
    parallel: bool,
}

impl<'a> ParamSweep<'a> {
    pub fn new(signals: &'a SignalMatrix, market: &'a MarketData) -> Self {
        Self {
            signals,
            market,
            parallel: true,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn sweep<F, D>(&self, grid: &ParamGrid, base: &BacktestConfig, factory: F) -> Result<SweepResults>
    where
        F: Fn(&BacktestConfig) -> D + Sync,
        D: DecisionFunction,
    {
        self.sweep_with_progress(grid, base, factory, |_, _, _| {})
    }

    /// Executes a sweep, invoking `progress(index, total, result)` after each run.
    pub fn sweep_with_progress<F, D, P>(
        &self,
        grid: &ParamGrid,
        base: &BacktestConfig,
        factory: F,
        progress: P,
    ) -> Result<SweepResults>
    where
        F: Fn(&BacktestConfig) -> D + Sync,
        D: DecisionFunction,
        P: Fn(usize, usize, &BacktestResult) + Send + Sync,
    {
        let configs = grid.generate_configs(base);
        let total = configs.len();
        info!(total, parallel = self.parallel, "starting parameter sweep");

        let run_one = |(idx, config): (usize, &BacktestConfig)| -> Result<BacktestResult> {
            let mut decision = factory(config);
            let result = run_backtest(config, self.signals, self.market, &mut decision)
                .with_context(|| format!("sweep run {} of {total}", idx + 1))?;
            progress(idx, total, &result);
            Ok(result)
        };

        let results = if self.parallel {
            configs
                .par_iter()
                .enumerate()
                .map(run_one)
                .collect::<Result<Vec<_>>>()?
        } else {
            configs
                .iter()
                .enumerate()
                .map(run_one)
                .collect::<Result<Vec<_>>>()?
        };

        Ok(SweepResults::new(results))
    }
}

/// Results from a parameter sweep, in grid order.
#[derive(Debug)]
pub struct SweepResults {
    results: Vec<BacktestResult>,
    by_run_id: HashMap<String, usize>,
}

impl SweepResults {
    fn new(results: Vec<BacktestResult>) -> Self {
        let by_run_id = results
            .iter()
            .enumerate()
            .map(|(idx, r)| (r.run_id.clone(), idx))
            .collect();
        Self { results, by_run_id }
    }

    pub fn all(&self) -> &[BacktestResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, run_id: &str) -> Option<&BacktestResult> {
        self.by_run_id.get(run_id).map(|&idx| &self.results[idx])
    }

    /// Results sorted by primary-variant CAGR, descending; NaN sorts last.
    pub fn sorted_by_cagr(&self) -> Vec<&BacktestResult> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by(|a, b| match (a.cagr().is_nan(), b.cagr().is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => b.cagr().partial_cmp(&a.cagr()).unwrap_or(Ordering::Equal),
        });
        sorted
    }

    pub fn top_n(&self, n: usize) -> Vec<&BacktestResult> {
        self.sorted_by_cagr().into_iter().take(n).collect()
    }

    pub fn best(&self) -> Option<&BacktestResult> {
        self.sorted_by_cagr().into_iter().next()
    }
}
