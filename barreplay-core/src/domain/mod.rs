//! Domain types for barreplay

pub mod bar;
pub mod events;
pub mod fill;
pub mod position;
pub mod signal;
pub mod snapshot;
pub mod trade;

pub use bar::Bar;
pub use events::{AdjustmentEvent, CorporateActionKind, DividendEvent};
pub use fill::{Fill, Order, OrderSide};
pub use position::Position;
pub use signal::{SignalMatrix, SignalMatrixError, SignalValue};
pub use snapshot::{DividendRecord, PortfolioSnapshot, PositionDetail};
pub use trade::TradeRecord;
