//! Market data inputs and their alignment to the run calendar.
//!
//! Alignment validates the signal window, optionally back-adjusts each
//! symbol's bars, and produces one bar per symbol per calendar date. A missing
//! bar inside the window is a [`EngineError::DataGap`].

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::adjust::CorporateActionAdjuster;
use crate::domain::{AdjustmentEvent, Bar, DividendEvent, SignalMatrix};

use super::state::{EngineConfig, EngineError};

/// Pre-loaded price history and corporate actions for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    /// Raw (unadjusted) bars per symbol, ascending by date.
    pub bars: BTreeMap<String, Vec<Bar>>,
    /// Chronologically ordered adjustment events per symbol.
    pub adjustments: BTreeMap<String, Vec<AdjustmentEvent>>,
    pub dividends: Vec<DividendEvent>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        self.bars.insert(symbol.into(), bars);
        self
    }

    pub fn with_adjustments(mut self, symbol: impl Into<String>, events: Vec<AdjustmentEvent>) -> Self {
        self.adjustments.insert(symbol.into(), events);
        self
    }

    pub fn with_dividend(mut self, event: DividendEvent) -> Self {
        self.dividends.push(event);
        self
    }
}

/// Dividend keyed by its ex-date bar, already on the adjusted basis.
///
/// The entitled volume is fixed at the ex-date bar; the cash is booked on
/// `pay_index`, the first calendar bar on or after the pay date.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScheduledDividend {
    pub symbol_index: usize,
    pub dividend_per_share: f64,
    pub pay_index: usize,
    pub event: DividendEvent,
}

/// Bars aligned to the calendar, ready for the loop.
#[derive(Debug, Clone)]
pub(crate) struct AlignedMarket {
    /// `(matrix row, date)` for every simulated bar.
    pub calendar: Vec<(usize, NaiveDate)>,
    /// `bars[symbol_index][calendar_index]`.
    pub bars: Vec<Vec<Bar>>,
    /// Close of the last bar before the window, per symbol index.
    pub prior_close: Vec<Option<f64>>,
    /// Dividends per ex-date calendar index.
    pub dividends: BTreeMap<usize, Vec<ScheduledDividend>>,
}

pub(crate) fn align(
    signals: &SignalMatrix,
    market: &MarketData,
    config: &EngineConfig,
) -> Result<AlignedMarket, EngineError> {
    let calendar = resolve_calendar(signals, config)?;
    let dates: Vec<NaiveDate> = calendar.iter().map(|(_, d)| *d).collect();

    for symbol in market.bars.keys() {
        if signals.symbol_index(symbol).is_none() {
            warn!(%symbol, "bars supplied for a symbol with no signal column; ignored");
        }
    }

    let mut bars = Vec::with_capacity(signals.symbols().len());
    let mut prior_close = Vec::with_capacity(signals.symbols().len());
    let mut adjusters = Vec::with_capacity(signals.symbols().len());

    for symbol in signals.symbols() {
        let raw = market.bars.get(symbol).map(Vec::as_slice).unwrap_or(&[]);
        check_ascending(symbol, raw)?;

        let adjuster = if config.adjustment.enabled {
            let events = market.adjustments.get(symbol).map(Vec::as_slice).unwrap_or(&[]);
            let adjuster = CorporateActionAdjuster::new(events, &config.adjustment.kinds)
                .map_err(|source| EngineError::Adjust {
                    symbol: symbol.clone(),
                    source,
                })?;
            Some(adjuster)
        } else {
            None
        };

        let series = match &adjuster {
            Some(adj) if !adj.is_empty() => adj.back_adjust_bars(raw),
            _ => raw.to_vec(),
        };

        let mut aligned = Vec::with_capacity(dates.len());
        for date in &dates {
            match series.binary_search_by(|b| b.date.cmp(date)) {
                Ok(i) => aligned.push(series[i].clone()),
                Err(_) => {
                    return Err(EngineError::DataGap {
                        symbol: symbol.clone(),
                        date: *date,
                    })
                }
            }
        }

        let void_bars = aligned.iter().filter(|b| b.is_void()).count();
        let insane_bars = aligned.iter().filter(|b| !b.is_void() && !b.is_sane()).count();
        if void_bars + insane_bars > 0 {
            warn!(%symbol, void_bars, insane_bars, "bars with missing or inconsistent OHLC in window");
        }

        let before = series.partition_point(|b| b.date < config.start_date);
        let prior = before
            .checked_sub(1)
            .map(|i| series[i].close)
            .filter(|c| c.is_finite() && *c > 0.0);

        bars.push(aligned);
        prior_close.push(prior);
        adjusters.push(adjuster);
    }

    let mut dividends: BTreeMap<usize, Vec<ScheduledDividend>> = BTreeMap::new();
    if config.dividends {
        for event in &market.dividends {
            let Some(symbol_index) = signals.symbol_index(&event.symbol) else {
                warn!(symbol = %event.symbol, "dividend for a symbol with no signal column; ignored");
                continue;
            };
            let Ok(calendar_index) = dates.binary_search(&event.ex_date) else {
                warn!(
                    symbol = %event.symbol,
                    ex_date = %event.ex_date,
                    "dividend ex-date is not a simulated bar; ignored"
                );
                continue;
            };
            let pay_index = match event.pay_date {
                Some(pay) if pay > event.ex_date => dates.partition_point(|d| *d < pay),
                _ => calendar_index,
            };
            if pay_index == dates.len() {
                warn!(
                    symbol = %event.symbol,
                    pay_date = ?event.pay_date,
                    "dividend pays after the run window; ignored"
                );
                continue;
            }
            let factor = adjusters[symbol_index]
                .as_ref()
                .map_or(1.0, |adj| adj.back_factor(event.ex_date));
            dividends
                .entry(calendar_index)
                .or_default()
                .push(ScheduledDividend {
                    symbol_index,
                    dividend_per_share: event.dividend_per_share / factor,
                    pay_index,
                    event: event.clone(),
                });
        }
        for scheduled in dividends.values_mut() {
            scheduled.sort_by_key(|d| d.symbol_index);
        }
    }

    Ok(AlignedMarket {
        calendar,
        bars,
        prior_close,
        dividends,
    })
}

fn resolve_calendar(
    signals: &SignalMatrix,
    config: &EngineConfig,
) -> Result<Vec<(usize, NaiveDate)>, EngineError> {
    let mismatch = |reason: String| EngineError::DateRangeMismatch { reason };

    let (Some(first), Some(last)) = (signals.dates().first(), signals.dates().last()) else {
        return Err(mismatch("signal matrix has no dates".into()));
    };
    if *first > config.start_date || *last < config.end_date {
        return Err(mismatch(format!(
            "signal matrix covers {first}..={last}, run window is {}..={}",
            config.start_date, config.end_date
        )));
    }

    let calendar = signals.window(config.start_date, config.end_date);
    if calendar.is_empty() {
        return Err(mismatch(format!(
            "no signal dates inside {}..={}",
            config.start_date, config.end_date
        )));
    }

    if let Some(expected) = &config.trading_calendar {
        let expected: Vec<NaiveDate> = expected
            .iter()
            .copied()
            .filter(|d| *d >= config.start_date && *d <= config.end_date)
            .collect();
        let actual: Vec<NaiveDate> = calendar.iter().map(|(_, d)| *d).collect();
        if let Some(pos) = expected.iter().zip(&actual).position(|(e, a)| e != a) {
            return Err(mismatch(format!(
                "signal date {} does not match trading calendar date {}",
                actual[pos], expected[pos]
            )));
        }
        if expected.len() != actual.len() {
            return Err(mismatch(format!(
                "signal matrix has {} dates in the window, trading calendar has {}",
                actual.len(),
                expected.len()
            )));
        }
    }

    Ok(calendar)
}

fn check_ascending(symbol: &str, bars: &[Bar]) -> Result<(), EngineError> {
    match bars.windows(2).find(|pair| pair[1].date <= pair[0].date) {
        Some(pair) => Err(EngineError::DateRangeMismatch {
            reason: format!(
                "bars for {symbol} are not strictly ascending: {} is followed by {}",
                pair[0].date, pair[1].date
            ),
        }),
        None => Ok(()),
    }
}
