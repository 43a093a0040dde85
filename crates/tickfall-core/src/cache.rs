//! Store-backed freshness cache.
//!
//! One logical entry per `(data kind, symbol)` key. Entries are overwritten
//! by every successful refresh and never evicted: an arbitrarily old entry
//! is still the last-known-good fallback. Freshness itself is a pure
//! computation over the stored timestamp, so callers can probe it on every
//! request without side effects.

use std::time::Duration;

use thiserror::Error;
use tickfall_store::{HistoryRow, QuoteRow, Store, StoreError};

use crate::{
    CalendarDate, HistoryPoint, HistorySeries, QuoteRecord, Symbol, UtcDateTime, ValidationError,
};

/// A cached value plus the time it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: UtcDateTime,
}

/// Cache read/write failure. The orchestrator treats read failures as a
/// miss and write failures as log-and-continue.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cached row is corrupt: {0}")]
    Corrupt(#[from] ValidationError),
}

/// Persistent key-value cache over the store's quote and history tables.
#[derive(Clone)]
pub struct FreshnessCache {
    store: Store,
}

impl FreshnessCache {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Whether `entry` is still fresh at `now` under `ttl`.
    pub fn is_fresh<T>(entry: &CacheEntry<T>, now: UtcDateTime, ttl: Duration) -> bool {
        let age = now.since(entry.stored_at);
        age.as_seconds_f64() <= ttl.as_secs_f64()
    }

    /// Last stored quote for a symbol, however old.
    pub fn quote(&self, symbol: &Symbol) -> Result<Option<CacheEntry<QuoteRecord>>, CacheError> {
        let Some(row) = self.store.latest_quote(symbol.as_str())? else {
            return Ok(None);
        };

        let record = quote_from_row(row)?;
        let stored_at = record.fetched_at;
        Ok(Some(CacheEntry {
            value: record,
            stored_at,
        }))
    }

    /// Last stored history window for a symbol, ascending, however old.
    ///
    /// The stored-at time is the newest point's fetch time; the series
    /// reads as real only when every retained point is real.
    pub fn history(
        &self,
        symbol: &Symbol,
        window: usize,
    ) -> Result<Option<CacheEntry<HistorySeries>>, CacheError> {
        let rows = self.store.history_window(symbol.as_str(), window)?;
        if rows.is_empty() {
            return Ok(None);
        }

        let is_real = rows.iter().all(|row| row.is_real);
        let mut stored_at: Option<UtcDateTime> = None;
        let mut points = Vec::with_capacity(rows.len());

        for row in rows {
            let fetched_at = UtcDateTime::parse(&row.fetched_at)?;
            stored_at = Some(match stored_at {
                Some(current) if current >= fetched_at => current,
                _ => fetched_at,
            });

            let date = CalendarDate::parse(&row.date)?;
            let volume = u64::try_from(row.volume)
                .map_err(|_| ValidationError::NegativeValue { field: "volume" })?;
            points.push(HistoryPoint::new(date, row.close, volume)?);
        }

        let stored_at = stored_at.expect("non-empty row set has a stored-at time");
        let series = HistorySeries::new(symbol.clone(), points, stored_at, is_real)?;

        Ok(Some(CacheEntry {
            value: series,
            stored_at,
        }))
    }

    /// Overwrite the quote entry for the record's symbol.
    pub fn put_quote(&self, record: &QuoteRecord) -> Result<(), CacheError> {
        self.store.insert_quote(&quote_to_row(record))?;
        Ok(())
    }

    /// Overwrite the stored window with this series' points.
    pub fn put_history(&self, series: &HistorySeries) -> Result<(), CacheError> {
        let fetched_at = series.fetched_at.format_rfc3339();
        let rows: Vec<HistoryRow> = series
            .points
            .iter()
            .map(|point| HistoryRow {
                symbol: series.symbol.as_str().to_owned(),
                date: point.date.format_calendar(),
                close: point.close,
                volume: clamp_volume(point.volume),
                is_real: series.is_real,
                fetched_at: fetched_at.clone(),
            })
            .collect();

        self.store.upsert_history(&rows)?;
        Ok(())
    }
}

fn quote_from_row(row: QuoteRow) -> Result<QuoteRecord, ValidationError> {
    let symbol = Symbol::parse(&row.symbol)?;
    let fetched_at = UtcDateTime::parse(&row.fetched_at)?;
    let volume =
        u64::try_from(row.volume).map_err(|_| ValidationError::NegativeValue { field: "volume" })?;

    QuoteRecord::new(
        symbol,
        row.price,
        row.change_percent,
        volume,
        fetched_at,
        row.is_real,
    )
}

fn quote_to_row(record: &QuoteRecord) -> QuoteRow {
    QuoteRow {
        symbol: record.symbol.as_str().to_owned(),
        price: record.price,
        change_percent: record.change_percent,
        volume: clamp_volume(record.volume),
        is_real: record.is_real,
        fetched_at: record.fetched_at.format_rfc3339(),
    }
}

fn clamp_volume(volume: u64) -> i64 {
    i64::try_from(volume).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tickfall_store::StoreConfig;

    fn open_cache(dir: &tempfile::TempDir) -> FreshnessCache {
        let store = Store::open(StoreConfig {
            data_home: dir.path().to_path_buf(),
            db_path: dir.path().join("tickfall.duckdb"),
            max_pool_size: 2,
        })
        .expect("store open");
        FreshnessCache::new(store)
    }

    fn ts(raw: &str) -> UtcDateTime {
        UtcDateTime::parse(raw).expect("timestamp")
    }

    fn quote_at(symbol: &Symbol, price: f64, fetched_at: UtcDateTime) -> QuoteRecord {
        QuoteRecord::new(symbol.clone(), price, 0.4, 1_000_000, fetched_at, true)
            .expect("valid record")
    }

    #[test]
    fn quote_round_trips_through_the_store() {
        let dir = tempdir().expect("tempdir");
        let cache = open_cache(&dir);
        let symbol = Symbol::parse("AAPL").expect("symbol");

        let record = quote_at(&symbol, 178.72, ts("2026-03-02T10:00:00Z"));
        cache.put_quote(&record).expect("put");

        let entry = cache.quote(&symbol).expect("get").expect("entry");
        assert_eq!(entry.value, record);
        assert_eq!(entry.stored_at, record.fetched_at);
    }

    #[test]
    fn newer_put_supersedes_older() {
        let dir = tempdir().expect("tempdir");
        let cache = open_cache(&dir);
        let symbol = Symbol::parse("AAPL").expect("symbol");

        cache
            .put_quote(&quote_at(&symbol, 170.0, ts("2026-03-02T10:00:00Z")))
            .expect("first put");
        cache
            .put_quote(&quote_at(&symbol, 171.5, ts("2026-03-02T11:00:00Z")))
            .expect("second put");

        let entry = cache.quote(&symbol).expect("get").expect("entry");
        assert_eq!(entry.value.price, 171.5);
    }

    #[test]
    fn freshness_flips_exactly_at_the_ttl_boundary() {
        let dir = tempdir().expect("tempdir");
        let cache = open_cache(&dir);
        let symbol = Symbol::parse("AAPL").expect("symbol");
        let t0 = ts("2026-03-02T10:00:00Z");
        let ttl = Duration::from_secs(600);

        cache.put_quote(&quote_at(&symbol, 170.0, t0)).expect("put");
        let entry = cache.quote(&symbol).expect("get").expect("entry");

        let just_before = t0.plus(ttl).minus(Duration::from_secs(1));
        let just_after = t0.plus(ttl).plus(Duration::from_secs(1));
        assert!(FreshnessCache::is_fresh(&entry, just_before, ttl));
        assert!(!FreshnessCache::is_fresh(&entry, just_after, ttl));
    }

    #[test]
    fn mixed_provenance_window_reads_as_not_real() {
        let dir = tempdir().expect("tempdir");
        let cache = open_cache(&dir);
        let symbol = Symbol::parse("TSLA").expect("symbol");

        let d0 = CalendarDate::parse("2026-03-01").expect("date");
        let synthetic = HistorySeries::new(
            symbol.clone(),
            vec![HistoryPoint::new(d0, 238.0, 1_000).expect("point")],
            ts("2026-03-01T20:00:00Z"),
            false,
        )
        .expect("series");
        cache.put_history(&synthetic).expect("put synthetic");

        let real = HistorySeries::new(
            symbol.clone(),
            vec![HistoryPoint::new(d0.next_day(), 240.0, 1_100).expect("point")],
            ts("2026-03-02T20:00:00Z"),
            true,
        )
        .expect("series");
        cache.put_history(&real).expect("put real");

        let entry = cache.history(&symbol, 30).expect("get").expect("entry");
        assert_eq!(entry.value.len(), 2);
        assert!(!entry.value.is_real);
        assert_eq!(entry.stored_at, ts("2026-03-02T20:00:00Z"));
    }

    #[test]
    fn missing_symbol_is_a_clean_miss() {
        let dir = tempdir().expect("tempdir");
        let cache = open_cache(&dir);
        let symbol = Symbol::parse("ZZZZ").expect("symbol");

        assert!(cache.quote(&symbol).expect("get").is_none());
        assert!(cache.history(&symbol, 30).expect("get").is_none());
    }
}
