//! Fallback orchestrator.
//!
//! For every `(kind, symbol)` request the service walks one chain:
//! fresh cache hit, else budget-gated upstream call, else stale cache,
//! else synthesized data. Every rung yields a result, so a single-symbol
//! lookup never surfaces an error; degradation shows up only as the
//! `stale` flag and the record's `is_real` provenance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tracing::{debug, warn};

use tickfall_store::Store;

use crate::budget::{BudgetPolicy, CallBudget};
use crate::cache::FreshnessCache;
use crate::market_clock::session_tier;
use crate::source::QuoteSource;
use crate::synthetic::{SyntheticConfig, SyntheticGenerator};
use crate::ttl::TtlPolicy;
use crate::{DataKind, HistorySeries, QuoteRecord, Symbol, UtcDateTime, HISTORY_WINDOW};

/// Orchestrator tuning: TTLs, budget, synthetic table, window length, and
/// the default watch list served by [`MarketDataService::market_overview`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub ttl: TtlPolicy,
    pub budget: BudgetPolicy,
    pub synthetic: SyntheticConfig,
    pub history_window: usize,
    pub watchlist: Vec<Symbol>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let watchlist = ["AAPL", "TSLA", "BRK.B", "SCT"]
            .into_iter()
            .map(|raw| Symbol::parse(raw).expect("default watchlist symbols are valid"))
            .collect();

        Self {
            ttl: TtlPolicy::default(),
            budget: BudgetPolicy::default(),
            synthetic: SyntheticConfig::default(),
            history_window: HISTORY_WINDOW,
            watchlist,
        }
    }
}

/// A quote answer. `stale` marks a cache entry served past its TTL;
/// `record.is_real` marks provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ServedQuote {
    pub record: QuoteRecord,
    pub stale: bool,
}

/// A history answer, flagged like [`ServedQuote`].
#[derive(Debug, Clone, PartialEq)]
pub struct ServedHistory {
    pub series: HistorySeries,
    pub stale: bool,
}

/// Per-key async locks serializing read-then-write on one cache key.
///
/// Two concurrent refreshes of the same symbol must not race each other's
/// writes; refreshes of different keys stay independent.
struct KeyedLocks {
    inner: Mutex<HashMap<(DataKind, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, kind: DataKind, symbol: &Symbol) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self
            .inner
            .lock()
            .expect("keyed lock registry is not poisoned");
        Arc::clone(
            map.entry((kind, symbol.as_str().to_owned()))
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

/// The market data engine handed to the host's routing layer.
#[derive(Clone)]
pub struct MarketDataService {
    source: Arc<dyn QuoteSource>,
    cache: FreshnessCache,
    budget: Arc<CallBudget>,
    synthetic: SyntheticGenerator,
    ttl: TtlPolicy,
    history_window: usize,
    watchlist: Vec<Symbol>,
    locks: Arc<KeyedLocks>,
}

impl MarketDataService {
    pub fn new(source: Arc<dyn QuoteSource>, store: Store, config: ServiceConfig) -> Self {
        Self {
            source,
            cache: FreshnessCache::new(store.clone()),
            budget: Arc::new(CallBudget::new(store, config.budget)),
            synthetic: SyntheticGenerator::new(config.synthetic),
            ttl: config.ttl,
            history_window: config.history_window,
            watchlist: config.watchlist,
            locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn watchlist(&self) -> &[Symbol] {
        &self.watchlist
    }

    /// Latest quote for one symbol: fresh cache, else upstream, else stale
    /// cache, else synthetic.
    pub async fn latest_quote(&self, symbol: &Symbol) -> ServedQuote {
        let key_lock = self.locks.entry(DataKind::Quote, symbol);
        let _guard = key_lock.lock().await;

        let now = UtcDateTime::now();
        let ttl = self
            .ttl
            .ttl_for(DataKind::Quote, session_tier(now.into_inner()));

        let cached = match self.cache.quote(symbol) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(symbol = %symbol, error = %error, "quote cache read failed; treating as miss");
                None
            }
        };

        if let Some(entry) = &cached {
            if FreshnessCache::is_fresh(entry, now, ttl) {
                return ServedQuote {
                    record: entry.value.clone(),
                    stale: false,
                };
            }
        }

        if self.budget.try_acquire(now) {
            match self.source.fetch_quote(symbol).await {
                Ok(record) => {
                    self.write_quote(&record);
                    return ServedQuote {
                        record,
                        stale: false,
                    };
                }
                Err(error) => {
                    debug!(symbol = %symbol, source = self.source.id(), error = %error,
                        "upstream quote fetch failed; falling back");
                }
            }
        } else {
            debug!(symbol = %symbol, "call budget denied; falling back");
        }

        if let Some(entry) = cached {
            return ServedQuote {
                record: entry.value,
                stale: true,
            };
        }

        let record = self.synthetic.quote(symbol, now);
        self.write_quote(&record);
        ServedQuote {
            record,
            stale: false,
        }
    }

    /// Daily history window for one symbol, same chain as quotes.
    pub async fn history(&self, symbol: &Symbol) -> ServedHistory {
        let key_lock = self.locks.entry(DataKind::History, symbol);
        let _guard = key_lock.lock().await;

        let now = UtcDateTime::now();
        let ttl = self
            .ttl
            .ttl_for(DataKind::History, session_tier(now.into_inner()));

        let cached = match self.cache.history(symbol, self.history_window) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(symbol = %symbol, error = %error, "history cache read failed; treating as miss");
                None
            }
        };

        if let Some(entry) = &cached {
            if FreshnessCache::is_fresh(entry, now, ttl) {
                return ServedHistory {
                    series: entry.value.clone(),
                    stale: false,
                };
            }
        }

        if self.budget.try_acquire(now) {
            match self.source.fetch_history(symbol, self.history_window).await {
                Ok(series) => {
                    self.write_history(&series);
                    return ServedHistory {
                        series,
                        stale: false,
                    };
                }
                Err(error) => {
                    debug!(symbol = %symbol, source = self.source.id(), error = %error,
                        "upstream history fetch failed; falling back");
                }
            }
        } else {
            debug!(symbol = %symbol, "call budget denied; falling back");
        }

        if let Some(entry) = cached {
            return ServedHistory {
                series: entry.value,
                stale: true,
            };
        }

        let series = self.synthetic.history(symbol, now);
        self.write_history(&series);
        ServedHistory {
            series,
            stale: false,
        }
    }

    /// Quotes for a whole board: one concurrent task per symbol, joined
    /// before returning. A symbol's failure degrades that symbol alone.
    pub async fn quote_board(&self, symbols: &[Symbol]) -> Vec<ServedQuote> {
        let mut tasks = JoinSet::new();
        for (index, symbol) in symbols.iter().enumerate() {
            let service = self.clone();
            let symbol = symbol.clone();
            tasks.spawn(async move { (index, service.latest_quote(&symbol).await) });
        }

        let mut slots: Vec<Option<ServedQuote>> = symbols.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, served)) => slots[index] = Some(served),
                Err(error) => warn!(error = %error, "quote task failed; slot degrades to synthetic"),
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| ServedQuote {
                    record: self.synthetic.quote(&symbols[index], UtcDateTime::now()),
                    stale: false,
                })
            })
            .collect()
    }

    /// History fan-out over a symbol set, with the same isolation as
    /// [`MarketDataService::quote_board`].
    pub async fn history_board(&self, symbols: &[Symbol]) -> Vec<ServedHistory> {
        let mut tasks = JoinSet::new();
        for (index, symbol) in symbols.iter().enumerate() {
            let service = self.clone();
            let symbol = symbol.clone();
            tasks.spawn(async move { (index, service.history(&symbol).await) });
        }

        let mut slots: Vec<Option<ServedHistory>> = symbols.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, served)) => slots[index] = Some(served),
                Err(error) => {
                    warn!(error = %error, "history task failed; slot degrades to synthetic");
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| ServedHistory {
                    series: self.synthetic.history(&symbols[index], UtcDateTime::now()),
                    stale: false,
                })
            })
            .collect()
    }

    /// Quotes for the configured default watch list.
    pub async fn market_overview(&self) -> Vec<ServedQuote> {
        let watchlist = self.watchlist.clone();
        self.quote_board(&watchlist).await
    }

    fn write_quote(&self, record: &QuoteRecord) {
        if let Err(error) = self.cache.put_quote(record) {
            warn!(symbol = %record.symbol, error = %error,
                "quote cache write failed; serving the value anyway");
        }
    }

    fn write_history(&self, series: &HistorySeries) {
        if let Err(error) = self.cache.put_history(series) {
            warn!(symbol = %series.symbol, error = %error,
                "history cache write failed; serving the value anyway");
        }
    }
}
