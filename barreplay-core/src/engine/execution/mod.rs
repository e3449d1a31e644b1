//! Execution — price-match modes, cost model and the order matcher.
//!
//! The matcher is stateless: it carries only configuration and is handed the
//! bar and the account availability for each order.

pub mod cost_model;
pub mod matcher;
pub mod price_match;

pub use cost_model::CostModel;
pub use matcher::{Availability, MatchResult, OrderMatcher};
pub use price_match::PriceMatchMode;

use serde::{Deserialize, Serialize};

/// Configuration for order matching.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub price_match: PriceMatchMode,
    pub cost_model: CostModel,
}

impl ExecutionConfig {
    pub fn frictionless() -> Self {
        Self::default()
    }

    pub fn new(price_match: PriceMatchMode, cost_model: CostModel) -> Self {
        Self {
            price_match,
            cost_model,
        }
    }
}
