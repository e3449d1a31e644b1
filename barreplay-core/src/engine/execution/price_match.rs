//! Price-match modes — which intra-bar price an order executes at.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;

/// Policy selecting the base execution price from a bar.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceMatchMode {
    #[default]
    Open,
    High,
    Low,
    Close,
    /// (H + L) / 2
    Median,
    /// (H + L + C) / 3
    Typical,
    /// (H + L + 2C) / 4
    Weighted,
    /// Caller-supplied price function. Not representable in config files.
    #[serde(skip)]
    Custom(fn(&Bar) -> f64),
}

impl PriceMatchMode {
    pub fn base_price(&self, bar: &Bar) -> f64 {
        match self {
            PriceMatchMode::Open => bar.open,
            PriceMatchMode::High => bar.high,
            PriceMatchMode::Low => bar.low,
            PriceMatchMode::Close => bar.close,
            PriceMatchMode::Median => (bar.high + bar.low) / 2.0,
            PriceMatchMode::Typical => (bar.high + bar.low + bar.close) / 3.0,
            PriceMatchMode::Weighted => (bar.high + bar.low + 2.0 * bar.close) / 4.0,
            PriceMatchMode::Custom(f) => f(bar),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PriceMatchMode::Open => "open",
            PriceMatchMode::High => "high",
            PriceMatchMode::Low => "low",
            PriceMatchMode::Close => "close",
            PriceMatchMode::Median => "median",
            PriceMatchMode::Typical => "typical",
            PriceMatchMode::Weighted => "weighted",
            PriceMatchMode::Custom(_) => "custom",
        }
    }
}
