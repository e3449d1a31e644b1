//! Engine configuration, errors, and run result types.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adjust::AdjustError;
use crate::domain::{CorporateActionKind, DividendRecord, Fill, PortfolioSnapshot, Position, TradeRecord};
use crate::engine::context::DecisionError;
use crate::engine::execution::ExecutionConfig;
use crate::engine::ledger::LedgerError;

pub const DEFAULT_LOT_SIZE: i64 = 100;
pub const DEFAULT_SIGNAL_DELAY: usize = 1;

/// How decisions and fills are ordered across symbols within one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSequencing {
    /// All decisions see the start-of-bar state; sells settle before buys.
    #[default]
    SellsFirst,
    /// Each symbol decides and settles before the next symbol decides.
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentConfig {
    pub enabled: bool,
    pub kinds: BTreeSet<CorporateActionKind>,
}

impl Default for AdjustmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kinds: CorporateActionKind::ALL.into_iter().collect(),
        }
    }
}

/// Configuration for a single simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_cash: f64,
    /// Bars between signal observation and execution.
    pub signal_delay: usize,
    pub execution: ExecutionConfig,
    pub sequencing: OrderSequencing,
    pub default_lot_size: i64,
    /// Per-symbol lot size overrides.
    pub lot_sizes: BTreeMap<String, i64>,
    pub adjustment: AdjustmentConfig,
    /// Run the with-dividend ledger alongside the primary one.
    pub dividends: bool,
    /// When set, the signal dates inside the window must equal this calendar.
    pub trading_calendar: Option<Vec<NaiveDate>>,
}

impl EngineConfig {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, initial_cash: f64) -> Self {
        Self {
            start_date,
            end_date,
            initial_cash,
            signal_delay: DEFAULT_SIGNAL_DELAY,
            execution: ExecutionConfig::frictionless(),
            sequencing: OrderSequencing::default(),
            default_lot_size: DEFAULT_LOT_SIZE,
            lot_sizes: BTreeMap::new(),
            adjustment: AdjustmentConfig::default(),
            dividends: true,
            trading_calendar: None,
        }
    }

    pub fn lot_size(&self, symbol: &str) -> i64 {
        self.lot_sizes
            .get(symbol)
            .copied()
            .unwrap_or(self.default_lot_size)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason: String| Err(EngineError::InvalidConfig { reason });
        if self.start_date > self.end_date {
            return invalid(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            ));
        }
        if !self.initial_cash.is_finite() || self.initial_cash < 0.0 {
            return invalid(format!("initial_cash must be >= 0, got {}", self.initial_cash));
        }
        let cost = &self.execution.cost_model;
        for (name, value) in [
            ("pct_commission", cost.pct_commission),
            ("pct_buy_slip", cost.pct_buy_slip),
            ("pct_sell_slip", cost.pct_sell_slip),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return invalid(format!("{name} must be within [0, 1], got {value}"));
            }
        }
        if self.default_lot_size < 1 {
            return invalid(format!("lot size must be >= 1, got {}", self.default_lot_size));
        }
        if let Some((symbol, lot)) = self.lot_sizes.iter().find(|(_, lot)| **lot < 1) {
            return invalid(format!("lot size for {symbol} must be >= 1, got {lot}"));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("date range mismatch: {reason}")]
    DateRangeMismatch { reason: String },

    #[error("data gap: no bar for {symbol} on {date}")]
    DataGap { symbol: String, date: NaiveDate },

    #[error("decision function failed for {symbol} on {date}: {source}")]
    Decision {
        symbol: String,
        date: NaiveDate,
        #[source]
        source: DecisionError,
    },

    #[error("ledger ({variant}): {source}")]
    Ledger {
        variant: &'static str,
        #[source]
        source: LedgerError,
    },

    #[error("adjustment events for {symbol}: {source}")]
    Adjust {
        symbol: String,
        #[source]
        source: AdjustError,
    },

    #[error("invalid engine config: {reason}")]
    InvalidConfig { reason: String },
}

/// Full history of one account variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantResult {
    pub snapshots: Vec<PortfolioSnapshot>,
    pub fills: Vec<Fill>,
    pub trades: Vec<TradeRecord>,
    pub dividends: Vec<DividendRecord>,
    /// Holdings still open after the last bar.
    pub open_positions: Vec<Position>,
    pub final_cash: f64,
    pub total_commission: f64,
}

impl VariantResult {
    pub fn final_equity(&self) -> Option<f64> {
        self.snapshots.last().map(PortfolioSnapshot::equity)
    }
}

/// Output of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_cash: f64,
    /// Dates actually simulated.
    pub calendar: Vec<NaiveDate>,
    /// Symbols in processing order.
    pub symbols: Vec<String>,
    pub without_dividend: VariantResult,
    pub with_dividend: Option<VariantResult>,
    /// Last valid close per symbol at the end of the run.
    pub last_close: BTreeMap<String, f64>,
}
