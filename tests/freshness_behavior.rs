//! Behavior-driven tests for the freshness cache and TTL policy.

use std::time::Duration;

use tempfile::tempdir;
use tickfall_core::{
    is_market_open, session_tier, CalendarDate, DataKind, FreshnessCache, HistoryPoint,
    HistorySeries, QuoteRecord, SessionTier, Store, StoreConfig, Symbol, TtlPolicy, UtcDateTime,
    HISTORY_WINDOW,
};

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

fn quote(symbol: &Symbol, price: f64, fetched_at: UtcDateTime) -> QuoteRecord {
    QuoteRecord::new(symbol.clone(), price, 0.8, 1_000_000, fetched_at, true)
        .expect("valid record")
}

// =============================================================================
// Freshness: TTL boundary
// =============================================================================

#[test]
fn entry_is_fresh_just_before_the_ttl_and_stale_just_after() {
    // Given: A quote stored at a known time with a ten-minute TTL
    let dir = tempdir().expect("tempdir");
    let cache = open_cache(&dir);
    let aapl = Symbol::parse("AAPL").expect("symbol");
    let t0 = ts("2026-03-02T10:00:00Z");
    let ttl = Duration::from_secs(600);

    cache.put_quote(&quote(&aapl, 178.72, t0)).expect("put");
    let entry = cache.quote(&aapl).expect("get").expect("entry");

    // Then: Freshness flips across the boundary
    assert!(FreshnessCache::is_fresh(
        &entry,
        t0.plus(ttl).minus(Duration::from_secs(1)),
        ttl
    ));
    assert!(!FreshnessCache::is_fresh(
        &entry,
        t0.plus(ttl).plus(Duration::from_secs(1)),
        ttl
    ));
}

#[test]
fn freshness_probes_do_not_touch_the_stored_entry() {
    // Given: A cached quote
    let dir = tempdir().expect("tempdir");
    let cache = open_cache(&dir);
    let aapl = Symbol::parse("AAPL").expect("symbol");
    let t0 = ts("2026-03-02T10:00:00Z");
    cache.put_quote(&quote(&aapl, 178.72, t0)).expect("put");

    // When: Freshness is evaluated repeatedly
    let entry = cache.quote(&aapl).expect("get").expect("entry");
    for _ in 0..5 {
        let _ = FreshnessCache::is_fresh(&entry, UtcDateTime::now(), Duration::from_secs(1));
    }

    // Then: The stored entry is byte-for-byte what was written
    let reread = cache.quote(&aapl).expect("get").expect("entry");
    assert_eq!(reread, entry);
}

// =============================================================================
// Freshness: overwrite semantics
// =============================================================================

#[test]
fn double_put_of_the_same_value_is_idempotent_beyond_the_timestamp() {
    // Given: The same record written twice, then once more with a newer time
    let dir = tempdir().expect("tempdir");
    let cache = open_cache(&dir);
    let aapl = Symbol::parse("AAPL").expect("symbol");
    let t0 = ts("2026-03-02T10:00:00Z");
    let record = quote(&aapl, 178.72, t0);

    cache.put_quote(&record).expect("first put");
    cache.put_quote(&record).expect("second put");

    // Then: The entry is unchanged and its freshness unaffected
    let entry = cache.quote(&aapl).expect("get").expect("entry");
    assert_eq!(entry.value, record);
    assert_eq!(entry.stored_at, t0);

    // And: A refresh with a newer fetch time supersedes rather than mutates
    let newer = quote(&aapl, 178.72, t0.plus(Duration::from_secs(3600)));
    cache.put_quote(&newer).expect("third put");
    let entry = cache.quote(&aapl).expect("get").expect("entry");
    assert_eq!(entry.stored_at, newer.fetched_at);
}

#[test]
fn history_reads_are_capped_at_the_window() {
    // Given: 35 cached daily points
    let dir = tempdir().expect("tempdir");
    let cache = open_cache(&dir);
    let aapl = Symbol::parse("AAPL").expect("symbol");

    let mut date = CalendarDate::parse("2026-01-05").expect("date");
    let mut points = Vec::new();
    for index in 0..35 {
        points.push(HistoryPoint::new(date, 100.0 + index as f64, 750_000).expect("point"));
        date = date.next_day();
    }
    let series = HistorySeries::new(aapl.clone(), points, ts("2026-02-08T20:00:00Z"), true)
        .expect("series");
    cache.put_history(&series).expect("put");

    // When: The window is read back
    let entry = cache
        .history(&aapl, HISTORY_WINDOW)
        .expect("get")
        .expect("entry");

    // Then: Only the most recent 30 days survive, still ascending
    assert_eq!(entry.value.len(), HISTORY_WINDOW);
    assert_eq!(
        entry.value.points[0].date.format_calendar(),
        "2026-01-10"
    );
    for pair in entry.value.points.windows(2) {
        assert_eq!(pair[0].date.next_day(), pair[1].date);
    }
}

// =============================================================================
// Freshness: session tier drives the TTL
// =============================================================================

#[test]
fn weekend_quotes_get_the_longest_ttl() {
    // Given: The default policy and three representative instants
    let policy = TtlPolicy::default();
    let open = ts("2026-03-02T10:30:00Z"); // Monday mid-session
    let evening = ts("2026-03-02T21:00:00Z"); // Monday evening
    let weekend = ts("2026-03-07T11:00:00Z"); // Saturday

    assert!(is_market_open(open.into_inner()));
    assert!(!is_market_open(weekend.into_inner()));

    // Then: Each tier selects a strictly longer quote TTL
    let ttl_open = policy.ttl_for(DataKind::Quote, session_tier(open.into_inner()));
    let ttl_evening = policy.ttl_for(DataKind::Quote, session_tier(evening.into_inner()));
    let ttl_weekend = policy.ttl_for(DataKind::Quote, session_tier(weekend.into_inner()));

    assert!(ttl_open < ttl_evening);
    assert!(ttl_evening < ttl_weekend);
    assert_eq!(
        session_tier(weekend.into_inner()),
        SessionTier::ClosedWeekend
    );
}

#[test]
fn an_entry_fresh_on_the_weekend_can_be_stale_when_trading_resumes() {
    // Given: A quote stored Saturday midday
    let dir = tempdir().expect("tempdir");
    let cache = open_cache(&dir);
    let policy = TtlPolicy::default();
    let aapl = Symbol::parse("AAPL").expect("symbol");
    let saturday = ts("2026-03-07T12:00:00Z");

    cache.put_quote(&quote(&aapl, 178.72, saturday)).expect("put");
    let entry = cache.quote(&aapl).expect("get").expect("entry");

    // When: Sunday midday, the weekend TTL still covers it
    let sunday = ts("2026-03-08T11:00:00Z");
    let weekend_ttl = policy.ttl_for(DataKind::Quote, session_tier(sunday.into_inner()));
    assert!(FreshnessCache::is_fresh(&entry, sunday, weekend_ttl));

    // Then: Monday mid-session, the open-market TTL has long lapsed
    let monday = ts("2026-03-09T10:00:00Z");
    let open_ttl = policy.ttl_for(DataKind::Quote, session_tier(monday.into_inner()));
    assert!(!FreshnessCache::is_fresh(&entry, monday, open_ttl));
}
