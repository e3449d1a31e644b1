use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which side of the book a fill executed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// A requested signed quantity for one symbol on one bar.
///
/// Produced by resolving the decision function's intent, consumed
/// immediately by the order matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub date: NaiveDate,
    pub requested_quantity: f64,
}

impl Order {
    pub fn side(&self) -> Option<OrderSide> {
        if self.requested_quantity > 0.0 {
            Some(OrderSide::Buy)
        } else if self.requested_quantity < 0.0 {
            Some(OrderSide::Sell)
        } else {
            None
        }
    }
}

/// An executed (non-zero) fill, as applied to a ledger.
///
/// `quantity` is signed: positive for buys, negative for sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub symbol: String,
    pub date: NaiveDate,
    pub bar_index: usize,
    pub quantity: i64,
    pub price: f64,
    pub commission: f64,
}

impl Fill {
    pub fn side(&self) -> OrderSide {
        if self.quantity >= 0 {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }

    /// Signed traded value: positive for buys, negative for sells.
    pub fn value(&self) -> f64 {
        self.quantity as f64 * self.price
    }

    /// Cash leaving the account for this fill (negative when cash arrives).
    pub fn cash_outflow(&self) -> f64 {
        self.value() + self.commission
    }
}
