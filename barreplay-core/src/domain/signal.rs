//! Signal matrix — date × symbol table of caller-computed signal values.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One cell of the signal matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum SignalValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    #[default]
    Missing,
}

impl SignalValue {
    /// Missing cells and float NaN both count as "no signal".
    pub fn is_missing(&self) -> bool {
        match self {
            SignalValue::Missing => true,
            SignalValue::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Numeric view: booleans map to 1.0/0.0, missing to NaN.
    pub fn as_f64(&self) -> f64 {
        match *self {
            SignalValue::Bool(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            SignalValue::Int(v) => v as f64,
            SignalValue::Float(v) => v,
            SignalValue::Missing => f64::NAN,
        }
    }

    /// Truthiness: non-zero numbers and `true` are set; missing is not.
    pub fn is_set(&self) -> bool {
        match *self {
            SignalValue::Bool(b) => b,
            SignalValue::Int(v) => v != 0,
            SignalValue::Float(v) => !v.is_nan() && v != 0.0,
            SignalValue::Missing => false,
        }
    }
}

impl From<bool> for SignalValue {
    fn from(v: bool) -> Self {
        SignalValue::Bool(v)
    }
}

impl From<i64> for SignalValue {
    fn from(v: i64) -> Self {
        SignalValue::Int(v)
    }
}

impl From<f64> for SignalValue {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            SignalValue::Missing
        } else {
            SignalValue::Float(v)
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SignalMatrixError {
    #[error("signal dates must be strictly ascending: {prev} is followed by {next}")]
    UnorderedDates { prev: NaiveDate, next: NaiveDate },

    #[error("signal row for {date} has {actual} values, expected {expected}")]
    RowLength {
        date: NaiveDate,
        expected: usize,
        actual: usize,
    },

    #[error("signal matrix has {actual} rows for {expected} dates")]
    RowCount { expected: usize, actual: usize },

    #[error("duplicate symbol column '{0}'")]
    DuplicateSymbol(String),
}

/// Date × symbol signal table.
///
/// Dates are strictly ascending. Symbol columns are stored in lexicographic
/// order regardless of the order they were supplied in, which fixes the
/// per-bar processing order of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSignalMatrix")]
pub struct SignalMatrix {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    /// Row-major: `values[date_index][symbol_index]`.
    values: Vec<Vec<SignalValue>>,
}

/// Deserialized form, validated and column-sorted by [`SignalMatrix::new`].
#[derive(Deserialize)]
struct RawSignalMatrix {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    values: Vec<Vec<SignalValue>>,
}

impl TryFrom<RawSignalMatrix> for SignalMatrix {
    type Error = SignalMatrixError;

    fn try_from(raw: RawSignalMatrix) -> Result<Self, Self::Error> {
        Self::new(raw.dates, raw.symbols, raw.values)
    }
}

impl SignalMatrix {
    pub fn new(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        rows: Vec<Vec<SignalValue>>,
    ) -> Result<Self, SignalMatrixError> {
        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(SignalMatrixError::UnorderedDates {
                    prev: pair[0],
                    next: pair[1],
                });
            }
        }
        for (date, row) in dates.iter().zip(&rows) {
            if row.len() != symbols.len() {
                return Err(SignalMatrixError::RowLength {
                    date: *date,
                    expected: symbols.len(),
                    actual: row.len(),
                });
            }
        }
        if rows.len() != dates.len() {
            return Err(SignalMatrixError::RowCount {
                expected: dates.len(),
                actual: rows.len(),
            });
        }

        let mut order: Vec<usize> = (0..symbols.len()).collect();
        order.sort_by(|&a, &b| symbols[a].cmp(&symbols[b]));
        for pair in order.windows(2) {
            if symbols[pair[0]] == symbols[pair[1]] {
                return Err(SignalMatrixError::DuplicateSymbol(symbols[pair[0]].clone()));
            }
        }

        let sorted_symbols = order.iter().map(|&i| symbols[i].clone()).collect();
        let sorted_rows = rows
            .into_iter()
            .map(|row| order.iter().map(|&i| row[i]).collect())
            .collect();

        Ok(Self {
            dates,
            symbols: sorted_symbols,
            values: sorted_rows,
        })
    }

    /// Build a matrix whose every cell is `value`.
    pub fn filled(dates: Vec<NaiveDate>, symbols: Vec<String>, value: SignalValue) -> Result<Self, SignalMatrixError> {
        let rows = vec![vec![value; symbols.len()]; dates.len()];
        Self::new(dates, symbols, rows)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Symbols in processing (lexicographic) order.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.binary_search_by(|s| s.as_str().cmp(symbol)).ok()
    }

    pub fn date_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Cell value; out-of-range coordinates read as missing.
    pub fn value(&self, date_index: usize, symbol_index: usize) -> SignalValue {
        self.values
            .get(date_index)
            .and_then(|row| row.get(symbol_index))
            .copied()
            .unwrap_or(SignalValue::Missing)
    }

    /// Cell value observed `delay` rows before `date_index`.
    pub fn delayed(&self, date_index: usize, symbol_index: usize, delay: usize) -> SignalValue {
        match date_index.checked_sub(delay) {
            Some(source) => self.value(source, symbol_index),
            None => SignalValue::Missing,
        }
    }

    /// Matrix dates within the inclusive window, with their row indices.
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> Vec<(usize, NaiveDate)> {
        self.dates
            .iter()
            .enumerate()
            .filter(|(_, d)| **d >= start && **d <= end)
            .map(|(i, d)| (i, *d))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn symbols_are_sorted_with_their_columns() {
        let m = SignalMatrix::new(
            vec![d(2), d(3)],
            vec!["ZZZ".into(), "AAA".into()],
            vec![
                vec![SignalValue::Int(1), SignalValue::Int(2)],
                vec![SignalValue::Int(3), SignalValue::Int(4)],
            ],
        )
        .unwrap();
        assert_eq!(m.symbols(), &["AAA".to_string(), "ZZZ".to_string()]);
        assert_eq!(m.value(0, 0), SignalValue::Int(2));
        assert_eq!(m.value(1, 1), SignalValue::Int(3));
    }

    #[test]
    fn rejects_unordered_dates() {
        let err = SignalMatrix::filled(vec![d(3), d(2)], vec!["AAA".into()], SignalValue::Missing)
            .unwrap_err();
        assert_eq!(
            err,
            SignalMatrixError::UnorderedDates {
                prev: d(3),
                next: d(2)
            }
        );
    }

    #[test]
    fn rejects_duplicate_symbols() {
        let err = SignalMatrix::filled(
            vec![d(2)],
            vec!["AAA".into(), "AAA".into()],
            SignalValue::Missing,
        )
        .unwrap_err();
        assert_eq!(err, SignalMatrixError::DuplicateSymbol("AAA".into()));
    }

    #[test]
    fn deserializing_sorts_and_validates_columns() {
        let json = format!(
            r#"{{"dates": ["{}", "{}"], "symbols": ["ZZZ", "AAA"], "values": [[1, 2], [3, 4]]}}"#,
            d(2),
            d(3)
        );
        let m: SignalMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(m.symbols(), &["AAA".to_string(), "ZZZ".to_string()]);
        assert_eq!(m.symbol_index("ZZZ"), Some(1));
        assert_eq!(m.value(1, 0), SignalValue::Int(4));

        let unordered = format!(
            r#"{{"dates": ["{}", "{}"], "symbols": ["AAA"], "values": [[true], [false]]}}"#,
            d(3),
            d(2)
        );
        assert!(serde_json::from_str::<SignalMatrix>(&unordered).is_err());
    }

    #[test]
    fn rejects_short_rows() {
        let err = SignalMatrix::new(
            vec![d(2)],
            vec!["AAA".into(), "BBB".into()],
            vec![vec![SignalValue::Int(1)]],
        )
        .unwrap_err();
        assert!(matches!(err, SignalMatrixError::RowLength { actual: 1, .. }));
    }

    #[test]
    fn delayed_reads_earlier_rows() {
        let m = SignalMatrix::new(
            vec![d(2), d(3), d(4)],
            vec!["AAA".into()],
            vec![
                vec![SignalValue::Float(1.0)],
                vec![SignalValue::Float(2.0)],
                vec![SignalValue::Float(3.0)],
            ],
        )
        .unwrap();
        assert_eq!(m.delayed(2, 0, 1), SignalValue::Float(2.0));
        assert_eq!(m.delayed(2, 0, 0), SignalValue::Float(3.0));
        assert!(m.delayed(0, 0, 1).is_missing());
    }

    #[test]
    fn window_is_inclusive() {
        let m = SignalMatrix::filled(vec![d(2), d(3), d(4), d(5)], vec!["AAA".into()], SignalValue::Missing)
            .unwrap();
        let w = m.window(d(3), d(4));
        assert_eq!(w, vec![(1, d(3)), (2, d(4))]);
    }

    #[test]
    fn nan_float_is_missing() {
        assert!(SignalValue::from(f64::NAN).is_missing());
        assert!(SignalValue::Float(f64::NAN).is_missing());
        assert!(!SignalValue::Bool(false).is_missing());
        assert!(SignalValue::Int(-1).is_set());
        assert_eq!(SignalValue::Bool(true).as_f64(), 1.0);
    }
}
