//! TOML-backed backtest configuration.
//!
//! ```toml
//! [backtest]
//! start_date = "2024-01-02"
//! end_date = "2024-12-31"
//! initial_cash = 1000000.0
//!
//! [execution]
//! price_match = "open"
//! pct_commission = 0.0003
//!
//! [lots]
//! default = 100
//! overrides = { "688001" = 200 }
//! ```
//!
//! Only `[backtest]` is required; every other section falls back to
//! frictionless, open-price, round-lot defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use barreplay_core::engine::{
    AdjustmentConfig, CostModel, EngineConfig, ExecutionConfig, OrderSequencing, PriceMatchMode,
    DEFAULT_LOT_SIZE, DEFAULT_SIGNAL_DELAY,
};

/// Content hash of a config; equal configs share a RunId.
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config: {0}")]
    Serialize(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub execution: ExecutionSection,
    #[serde(default)]
    pub lots: LotSection,
    #[serde(default)]
    pub adjustment: AdjustmentConfig,
    #[serde(default)]
    pub dividends: DividendSection,
}

/// Simulation window and starting capital.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSection {
    /// First simulated date (inclusive).
    pub start_date: NaiveDate,
    /// Last simulated date (inclusive).
    pub end_date: NaiveDate,
    pub initial_cash: f64,
    /// Bars between a signal and the order it drives.
    #[serde(default = "default_signal_delay")]
    pub signal_delay: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trading_calendar: Option<Vec<NaiveDate>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    pub price_match: PriceMatchMode,
    pub pct_commission: f64,
    pub pct_buy_slip: f64,
    pub pct_sell_slip: f64,
    pub sequencing: OrderSequencing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LotSection {
    pub default: i64,
    /// Per-symbol lot sizes.
    pub overrides: BTreeMap<String, i64>,
}

impl Default for LotSection {
    fn default() -> Self {
        Self {
            default: DEFAULT_LOT_SIZE,
            overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DividendSection {
    pub enabled: bool,
}

impl Default for DividendSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_signal_delay() -> usize {
    DEFAULT_SIGNAL_DELAY
}

impl BacktestConfig {
    /// Minimal config: the given window and cash, every other setting default.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, initial_cash: f64) -> Self {
        Self {
            backtest: BacktestSection {
                start_date,
                end_date,
                initial_cash,
                signal_delay: DEFAULT_SIGNAL_DELAY,
                trading_calendar: None,
            },
            execution: ExecutionSection::default(),
            lots: LotSection::default(),
            adjustment: AdjustmentConfig::default(),
            dividends: DividendSection::default(),
        }
    }

    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_engine_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Deterministic hash over the canonical JSON form.
    ///
    /// Fails only for a caller-supplied `PriceMatchMode::Custom`, which has
    /// no serialized form.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json =
            serde_json::to_string(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(
            self.execution.pct_commission,
            self.execution.pct_buy_slip,
            self.execution.pct_sell_slip,
        )
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        let mut engine = EngineConfig::new(
            self.backtest.start_date,
            self.backtest.end_date,
            self.backtest.initial_cash,
        );
        engine.signal_delay = self.backtest.signal_delay;
        engine.trading_calendar = self.backtest.trading_calendar.clone();
        engine.execution = ExecutionConfig::new(self.execution.price_match, self.cost_model());
        engine.sequencing = self.execution.sequencing;
        engine.default_lot_size = self.lots.default;
        engine.lot_sizes = self.lots.overrides.clone();
        engine.adjustment = self.adjustment.clone();
        engine.dividends = self.dividends.enabled;
        engine
    }
}
