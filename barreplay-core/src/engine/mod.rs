//! Simulation engine — bar-by-bar loop and supporting infrastructure.
//!
//! The engine consumes a signal matrix and pre-loaded market data, then runs
//! the per-bar cycle for two ledgers sharing one order stream:
//!
//! 1. Dividends (with-dividend ledger only)
//! 2. Context → decision function → order intent
//! 3. Order matcher → account ledger
//! 4. Portfolio snapshot

pub mod context;
pub mod execution;
pub mod ledger;
pub mod loop_runner;
pub mod market;
pub mod state;

pub use context::{decision_fn, Context, DecisionError, DecisionFunction, OrderIntent};
pub use execution::{
    Availability, CostModel, ExecutionConfig, MatchResult, OrderMatcher, PriceMatchMode,
};
pub use ledger::{AccountLedger, LedgerError, Valuation};
pub use loop_runner::run_simulation;
pub use market::MarketData;
pub use state::{
    AdjustmentConfig, EngineConfig, EngineError, OrderSequencing, SimulationResult,
    VariantResult, DEFAULT_LOT_SIZE, DEFAULT_SIGNAL_DELAY,
};
