//! Corporate-action and dividend events supplied alongside the price series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Kind of corporate action that changes a security's price basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorporateActionKind {
    CapitalReduction,
    ParChange,
    RatioChange,
    StockDividend,
    Rights,
}

impl CorporateActionKind {
    pub const ALL: [CorporateActionKind; 5] = [
        CorporateActionKind::CapitalReduction,
        CorporateActionKind::ParChange,
        CorporateActionKind::RatioChange,
        CorporateActionKind::StockDividend,
        CorporateActionKind::Rights,
    ];
}

/// A price-basis change effective from `date`.
///
/// `factor` is the ratio of the pre-event price to the post-event price:
/// a 2-for-1 split has factor 2.0, a 10:1 capital reduction factor 0.1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentEvent {
    /// First bar quoted on the new basis.
    pub date: NaiveDate,
    pub kind: CorporateActionKind,
    pub factor: f64,
}

/// Cash dividend. The holder of record at the close before `ex_date`
/// is entitled to `dividend_per_share`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendEvent {
    pub symbol: String,
    pub ex_date: NaiveDate,
    pub dividend_per_share: f64,
    pub pay_date: Option<NaiveDate>,
}
