use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{CalendarDate, Symbol, UtcDateTime, ValidationError};

/// Number of daily entries a history window holds.
pub const HISTORY_WINDOW: usize = 30;

/// The two cached data kinds, used as cache keys and TTL selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Quote,
    History,
}

impl DataKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::History => "history",
        }
    }
}

impl Display for DataKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One market data point for a symbol.
///
/// Records are immutable once created; a refresh supersedes the old record
/// with a new one rather than mutating it. `is_real` is the provenance flag:
/// true for upstream data, false for synthesized data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub symbol: Symbol,
    pub price: f64,
    pub change_percent: f64,
    pub volume: u64,
    pub fetched_at: UtcDateTime,
    pub is_real: bool,
}

impl QuoteRecord {
    pub fn new(
        symbol: Symbol,
        price: f64,
        change_percent: f64,
        volume: u64,
        fetched_at: UtcDateTime,
        is_real: bool,
    ) -> Result<Self, ValidationError> {
        validate_positive("price", price)?;
        validate_finite("change_percent", change_percent)?;

        Ok(Self {
            symbol,
            price,
            change_percent,
            volume,
            fetched_at,
            is_real,
        })
    }
}

/// One daily close for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: CalendarDate,
    pub close: f64,
    pub volume: u64,
}

impl HistoryPoint {
    pub fn new(date: CalendarDate, close: f64, volume: u64) -> Result<Self, ValidationError> {
        validate_positive("close", close)?;
        Ok(Self {
            date,
            close,
            volume,
        })
    }
}

/// Ordered daily series for one symbol.
///
/// Invariant: points are in strictly ascending date order (which also rules
/// out duplicate dates). Provenance is series-level; a window that mixes
/// upstream and synthesized rows in storage reads back as not real.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySeries {
    pub symbol: Symbol,
    pub points: Vec<HistoryPoint>,
    pub fetched_at: UtcDateTime,
    pub is_real: bool,
}

impl HistorySeries {
    pub fn new(
        symbol: Symbol,
        points: Vec<HistoryPoint>,
        fetched_at: UtcDateTime,
        is_real: bool,
    ) -> Result<Self, ValidationError> {
        for pair in points.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(ValidationError::UnorderedHistory);
            }
        }

        Ok(Self {
            symbol,
            points,
            fetched_at,
            is_real,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Ok(())
}

fn validate_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    validate_finite(field, value)?;
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveValue { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> UtcDateTime {
        UtcDateTime::parse("2026-03-02T10:00:00Z").expect("timestamp")
    }

    #[test]
    fn rejects_non_positive_price() {
        let symbol = Symbol::parse("AAPL").expect("symbol");
        let err = QuoteRecord::new(symbol, 0.0, 1.2, 1_000, ts(), true).expect_err("must fail");
        assert!(matches!(err, ValidationError::NonPositiveValue { field: "price" }));
    }

    #[test]
    fn rejects_non_finite_change() {
        let symbol = Symbol::parse("AAPL").expect("symbol");
        let err = QuoteRecord::new(symbol, 178.72, f64::NAN, 1_000, ts(), true)
            .expect_err("must fail");
        assert!(matches!(err, ValidationError::NonFiniteValue { .. }));
    }

    #[test]
    fn rejects_unordered_series() {
        let symbol = Symbol::parse("TSLA").expect("symbol");
        let d1 = CalendarDate::parse("2026-03-02").expect("date");
        let d2 = CalendarDate::parse("2026-03-01").expect("date");
        let points = vec![
            HistoryPoint::new(d1, 240.0, 1_000).expect("point"),
            HistoryPoint::new(d2, 241.0, 1_000).expect("point"),
        ];

        let err = HistorySeries::new(symbol, points, ts(), true).expect_err("must fail");
        assert!(matches!(err, ValidationError::UnorderedHistory));
    }

    #[test]
    fn rejects_duplicate_dates() {
        let symbol = Symbol::parse("TSLA").expect("symbol");
        let d = CalendarDate::parse("2026-03-02").expect("date");
        let points = vec![
            HistoryPoint::new(d, 240.0, 1_000).expect("point"),
            HistoryPoint::new(d, 241.0, 1_000).expect("point"),
        ];

        let err = HistorySeries::new(symbol, points, ts(), true).expect_err("must fail");
        assert!(matches!(err, ValidationError::UnorderedHistory));
    }

    #[test]
    fn accepts_ascending_series() {
        let symbol = Symbol::parse("TSLA").expect("symbol");
        let d1 = CalendarDate::parse("2026-03-01").expect("date");
        let points = vec![
            HistoryPoint::new(d1, 240.0, 1_000).expect("point"),
            HistoryPoint::new(d1.next_day(), 241.0, 1_100).expect("point"),
        ];

        let series = HistorySeries::new(symbol, points, ts(), true).expect("must build");
        assert_eq!(series.len(), 2);
    }
}
