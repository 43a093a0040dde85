//! # Tickfall Core
//!
//! Freshness, fallback, and call-budget engine for market data.
//!
//! ## Overview
//!
//! A host service asks tickfall for quotes and daily history. For every
//! `(kind, symbol)` request the engine decides between four answers, in
//! order: a fresh cache hit, a budget-gated upstream fetch, a stale cache
//! entry, or synthesized data. Whatever happens, the caller gets a value —
//! degradation is visible only through the staleness flag and the
//! `is_real` provenance on each record.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Upstream provider adapters (Alpha Vantage) |
//! | [`api_key`] | Rotated-key plumbing with a short cache |
//! | [`budget`] | Persisted daily call-budget governor |
//! | [`cache`] | Store-backed freshness cache |
//! | [`domain`] | Validated domain types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`market_clock`] | Market session oracle |
//! | [`service`] | Fallback orchestrator |
//! | [`source`] | Upstream source trait and error taxonomy |
//! | [`synthetic`] | Synthetic quote/series generator |
//! | [`ttl`] | Session-aware TTL policy |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tickfall_core::{
//!     AlphaVantageSource, MarketDataService, ServiceConfig, Store, Symbol,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Store::open_default()?;
//!     let source = Arc::new(AlphaVantageSource::default());
//!     let service = MarketDataService::new(source, store, ServiceConfig::default());
//!
//!     let served = service.latest_quote(&Symbol::parse("AAPL")?).await;
//!     println!(
//!         "{} = {} (real: {}, stale: {})",
//!         served.record.symbol, served.record.price, served.record.is_real, served.stale
//!     );
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  Host routing    │
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐    ┌──────────────────┐
//! │ MarketDataService│───▶│ CallBudget       │
//! │ (fallback chain) │    │ (daily ledger)   │
//! └───┬─────────┬────┘    └────────┬─────────┘
//!     │         │                  │
//!     ▼         ▼                  ▼
//! ┌─────────┐ ┌─────────────┐ ┌──────────────┐
//! │ Quote   │ │ Freshness   │ │ tickfall     │
//! │ Source  │ │ Cache       │─│ Store        │
//! │ (HTTP)  │ │ (TTL check) │ │ (DuckDB)     │
//! └─────────┘ └─────────────┘ └──────────────┘
//!       fallback of last resort: SyntheticGenerator
//! ```
//!
//! ## Error Handling
//!
//! Upstream failures are classified into a tagged [`FetchError`] and
//! recovered inside the orchestrator; cache write failures are logged and
//! swallowed. Only request construction (e.g. [`Symbol::parse`]) surfaces
//! errors to the caller.

pub mod adapters;
pub mod api_key;
pub mod budget;
pub mod cache;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod market_clock;
pub mod service;
pub mod source;
pub mod synthetic;
pub mod ttl;

// Re-export commonly used types at crate root for convenience

// Adapter implementations
pub use adapters::AlphaVantageSource;

// API key plumbing
pub use api_key::{ApiKeyProvider, CachedApiKey, StaticApiKey, DEFAULT_KEY_TTL};

// Call budget
pub use budget::{BudgetPolicy, CallBudget};

// Caching
pub use cache::{CacheEntry, CacheError, FreshnessCache};

// Domain models
pub use domain::{
    CalendarDate, DataKind, HistoryPoint, HistorySeries, QuoteRecord, Symbol, UtcDateTime,
    HISTORY_WINDOW,
};

// Error types
pub use error::ValidationError;

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};

// Market clock
pub use market_clock::{is_market_open, session_tier, SessionTier};

// Orchestrator
pub use service::{MarketDataService, ServedHistory, ServedQuote, ServiceConfig};

// Source contract
pub use source::{FetchError, FetchErrorKind, QuoteSource};

// Synthetic generation
pub use synthetic::{SyntheticConfig, SyntheticGenerator};

// TTL policy
pub use ttl::TtlPolicy;

// Store (re-exported from tickfall-store)
pub use tickfall_store::{
    BudgetRow, HistoryRow, QuoteRow, Store, StoreConfig, StoreError,
};
