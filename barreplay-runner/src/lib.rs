//! barreplay runner — configuration, reporting and sweeps over the core engine.
//!
//! This crate builds on `barreplay-core` to provide:
//! - TOML backtest configuration with content-hashed run ids
//! - Single-run entry point producing a performance report
//! - Trade statistics, drawdown and monthly breakdowns per account variant
//! - Parallel parameter sweeps keyed by run id
//! - Tracing subscriber initialisation

pub mod config;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError, RunId};
pub use logging::init_tracing;
pub use metrics::TradeStats;
pub use report::{
    DrawdownPoint, MonthlyReturn, MonthlySymbolPnl, PerformanceReport, SummaryStats, VariantReport,
};
pub use runner::{run_backtest, BacktestResult, RunError};
pub use sweep::{ParamGrid, ParamSweep, SweepResults};
