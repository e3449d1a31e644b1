//! Corporate-action adjuster — chained factor adjustment of price/volume series.
//!
//! An event's `date` is the first bar quoted on the new basis. Back-adjustment
//! restates every earlier bar on the latest basis by dividing by the product of
//! all later factors; forward adjustment restates later bars on the earliest
//! basis by multiplying by the product of factors already in effect.
//!
//! Event kinds not in the inclusion set pass through unadjusted.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{AdjustmentEvent, Bar, CorporateActionKind};

#[derive(Debug, Error, PartialEq)]
pub enum AdjustError {
    #[error("adjustment events out of order: {prev} is followed by {next}")]
    Unordered { prev: NaiveDate, next: NaiveDate },

    #[error("adjustment factor on {date} must be finite and positive, got {factor}")]
    InvalidFactor { date: NaiveDate, factor: f64 },

    #[error("series length mismatch: {dates} dates, {values} values")]
    LengthMismatch { dates: usize, values: usize },
}

/// Pure adjuster over one symbol's chronologically ordered event list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorporateActionAdjuster {
    /// Included events only, ascending by date.
    events: Vec<AdjustmentEvent>,
}

impl CorporateActionAdjuster {
    /// Build an adjuster from `events`, keeping only kinds in `include`.
    ///
    /// Every event is validated, including excluded ones, so a malformed
    /// event list is reported regardless of the inclusion set.
    pub fn new(
        events: &[AdjustmentEvent],
        include: &BTreeSet<CorporateActionKind>,
    ) -> Result<Self, AdjustError> {
        for pair in events.windows(2) {
            if pair[1].date < pair[0].date {
                return Err(AdjustError::Unordered {
                    prev: pair[0].date,
                    next: pair[1].date,
                });
            }
        }
        for event in events {
            if !event.factor.is_finite() || event.factor <= 0.0 {
                return Err(AdjustError::InvalidFactor {
                    date: event.date,
                    factor: event.factor,
                });
            }
        }
        let events = events
            .iter()
            .filter(|e| include.contains(&e.kind))
            .cloned()
            .collect();
        Ok(Self { events })
    }

    /// Adjuster that includes every corporate-action kind.
    pub fn all_kinds(events: &[AdjustmentEvent]) -> Result<Self, AdjustError> {
        let include = CorporateActionKind::ALL.into_iter().collect();
        Self::new(events, &include)
    }

    pub fn events(&self) -> &[AdjustmentEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Cumulative back-adjustment factor for a bar on `date`: the product of
    /// every included factor effective after `date`. An event's own date is
    /// already quoted on the new basis, so it is not divided again.
    pub fn back_factor(&self, date: NaiveDate) -> f64 {
        let first_later = self.events.partition_point(|e| e.date <= date);
        self.events[first_later..].iter().map(|e| e.factor).product()
    }

    /// Cumulative forward factor for a bar on `date`: the product of every
    /// included factor effective on or before `date`.
    pub fn forward_factor(&self, date: NaiveDate) -> f64 {
        let first_later = self.events.partition_point(|e| e.date <= date);
        self.events[..first_later].iter().map(|e| e.factor).product()
    }

    pub fn back_adjust(&self, dates: &[NaiveDate], prices: &[f64]) -> Result<Vec<f64>, AdjustError> {
        check_lengths(dates, prices)?;
        Ok(dates
            .iter()
            .zip(prices)
            .map(|(d, p)| p / self.back_factor(*d))
            .collect())
    }

    /// Inverse of [`back_adjust`](Self::back_adjust).
    pub fn reverse_back_adjust(
        &self,
        dates: &[NaiveDate],
        adjusted: &[f64],
    ) -> Result<Vec<f64>, AdjustError> {
        check_lengths(dates, adjusted)?;
        Ok(dates
            .iter()
            .zip(adjusted)
            .map(|(d, p)| p * self.back_factor(*d))
            .collect())
    }

    pub fn forward_adjust(&self, dates: &[NaiveDate], prices: &[f64]) -> Result<Vec<f64>, AdjustError> {
        check_lengths(dates, prices)?;
        Ok(dates
            .iter()
            .zip(prices)
            .map(|(d, p)| p * self.forward_factor(*d))
            .collect())
    }

    /// Inverse of [`forward_adjust`](Self::forward_adjust).
    pub fn reverse_forward_adjust(
        &self,
        dates: &[NaiveDate],
        adjusted: &[f64],
    ) -> Result<Vec<f64>, AdjustError> {
        check_lengths(dates, adjusted)?;
        Ok(dates
            .iter()
            .zip(adjusted)
            .map(|(d, p)| p / self.forward_factor(*d))
            .collect())
    }

    /// Carry a cost price established on `from` onto the basis in effect on `to`.
    pub fn forward_adjust_cost(&self, price: f64, from: NaiveDate, to: NaiveDate) -> f64 {
        let factor: f64 = self
            .events
            .iter()
            .filter(|e| e.date > from && e.date <= to)
            .map(|e| e.factor)
            .product();
        price / factor
    }

    /// Back-adjust a bar series: prices divided and volume multiplied by the
    /// bar's cumulative factor, which is recorded in `adjust_factor`.
    pub fn back_adjust_bars(&self, bars: &[Bar]) -> Vec<Bar> {
        bars.iter()
            .map(|bar| {
                let factor = self.back_factor(bar.date);
                Bar {
                    date: bar.date,
                    open: bar.open / factor,
                    high: bar.high / factor,
                    low: bar.low / factor,
                    close: bar.close / factor,
                    volume: bar.volume * factor,
                    adjust_factor: bar.adjust_factor * factor,
                }
            })
            .collect()
    }
}

fn check_lengths(dates: &[NaiveDate], values: &[f64]) -> Result<(), AdjustError> {
    if dates.len() != values.len() {
        return Err(AdjustError::LengthMismatch {
            dates: dates.len(),
            values: values.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn split(day: u32, factor: f64) -> AdjustmentEvent {
        AdjustmentEvent {
            date: d(day),
            kind: CorporateActionKind::RatioChange,
            factor,
        }
    }

    #[test]
    fn back_adjust_removes_split_jump() {
        // 2-for-1 split effective on the 4th: raw 100 → 50.
        let adj = CorporateActionAdjuster::all_kinds(&[split(4, 2.0)]).unwrap();
        let dates = [d(1), d(2), d(4), d(5)];
        let prices = [100.0, 100.0, 50.0, 51.0];
        let out = adj.back_adjust(&dates, &prices).unwrap();
        assert_eq!(out, vec![50.0, 50.0, 50.0, 51.0]);
    }

    #[test]
    fn bar_on_the_event_date_is_already_on_the_new_basis() {
        let adj = CorporateActionAdjuster::all_kinds(&[split(4, 2.0)]).unwrap();
        assert_eq!(adj.back_factor(d(3)), 2.0);
        assert_eq!(adj.back_factor(d(4)), 1.0);
        assert_eq!(adj.forward_factor(d(3)), 1.0);
        assert_eq!(adj.forward_factor(d(4)), 2.0);

        // Raw 100 the day before, 50 on the event date: no jump either way.
        let adjusted = adj.back_adjust(&[d(3), d(4)], &[100.0, 50.0]).unwrap();
        assert_eq!(adjusted, vec![50.0, 50.0]);
    }

    #[test]
    fn forward_adjust_restates_on_earliest_basis() {
        let adj = CorporateActionAdjuster::all_kinds(&[split(4, 2.0)]).unwrap();
        let dates = [d(1), d(4), d(5)];
        let out = adj.forward_adjust(&dates, &[100.0, 50.0, 51.0]).unwrap();
        assert_eq!(out, vec![100.0, 100.0, 102.0]);
    }

    #[test]
    fn factors_chain_multiplicatively() {
        let adj = CorporateActionAdjuster::all_kinds(&[split(4, 2.0), split(8, 0.5), split(9, 4.0)])
            .unwrap();
        assert_eq!(adj.back_factor(d(1)), 4.0);
        assert_eq!(adj.back_factor(d(4)), 2.0);
        assert_eq!(adj.back_factor(d(9)), 1.0);
        assert_eq!(adj.forward_factor(d(3)), 1.0);
        assert_eq!(adj.forward_factor(d(8)), 1.0);
        assert_eq!(adj.forward_factor(d(9)), 4.0);
    }

    #[test]
    fn excluded_kinds_pass_through() {
        let events = [
            split(4, 2.0),
            AdjustmentEvent {
                date: d(6),
                kind: CorporateActionKind::Rights,
                factor: 1.25,
            },
        ];
        let include: BTreeSet<_> = [CorporateActionKind::Rights].into_iter().collect();
        let adj = CorporateActionAdjuster::new(&events, &include).unwrap();
        assert_eq!(adj.events().len(), 1);
        assert_eq!(adj.back_factor(d(1)), 1.25);

        let none = CorporateActionAdjuster::new(&events, &BTreeSet::new()).unwrap();
        let prices = [10.0, 20.0];
        assert_eq!(none.back_adjust(&[d(1), d(7)], &prices).unwrap(), prices.to_vec());
    }

    #[test]
    fn forward_adjust_cost_halves_on_split() {
        let adj = CorporateActionAdjuster::all_kinds(&[split(4, 2.0)]).unwrap();
        assert_eq!(adj.forward_adjust_cost(100.0, d(1), d(5)), 50.0);
        assert_eq!(adj.forward_adjust_cost(100.0, d(4), d(5)), 100.0);
        assert_eq!(adj.forward_adjust_cost(100.0, d(1), d(3)), 100.0);
    }

    #[test]
    fn bars_adjust_volume_inversely() {
        let adj = CorporateActionAdjuster::all_kinds(&[split(4, 2.0)]).unwrap();
        let bars = vec![
            Bar::new(d(1), 100.0, 104.0, 98.0, 102.0, 1_000.0),
            Bar::new(d(4), 51.0, 52.0, 49.0, 50.0, 2_000.0),
        ];
        let out = adj.back_adjust_bars(&bars);
        assert_eq!(out[0].open, 50.0);
        assert_eq!(out[0].close, 51.0);
        assert_eq!(out[0].volume, 2_000.0);
        assert_eq!(out[0].adjust_factor, 2.0);
        assert_eq!(out[1], bars[1]);
        assert_eq!(out[0].open * out[0].volume, bars[0].open * bars[0].volume);
    }

    #[test]
    fn rejects_unordered_events() {
        let err = CorporateActionAdjuster::all_kinds(&[split(8, 2.0), split(4, 2.0)]).unwrap_err();
        assert_eq!(err, AdjustError::Unordered { prev: d(8), next: d(4) });
    }

    #[test]
    fn rejects_non_positive_factor() {
        let err = CorporateActionAdjuster::all_kinds(&[split(4, 0.0)]).unwrap_err();
        assert!(matches!(err, AdjustError::InvalidFactor { .. }));
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let adj = CorporateActionAdjuster::all_kinds(&[]).unwrap();
        let err = adj.back_adjust(&[d(1)], &[1.0, 2.0]).unwrap_err();
        assert_eq!(err, AdjustError::LengthMismatch { dates: 1, values: 2 });
    }
}
