//! barreplay core — replays per-symbol signals against historical bars.
//!
//! This crate contains the simulation engine:
//! - Domain types (bars, signals, fills, positions, trades, snapshots, events)
//! - Corporate-action price/volume adjustment
//! - Order matching with price-match modes, slippage, commission and lots
//! - Account ledger with exact cash accounting
//! - Bar-by-bar loop driving a caller-supplied decision function

pub mod adjust;
pub mod domain;
pub mod engine;

pub use adjust::{AdjustError, CorporateActionAdjuster};
pub use engine::{run_simulation, EngineConfig, EngineError, MarketData, SimulationResult};
