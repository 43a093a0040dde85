//! Upstream source contract and error taxonomy.
//!
//! The adapter only fetches and classifies; it never touches the cache or
//! the call budget. The orchestrator recovers from every [`FetchError`]
//! locally, so these errors never escape a single-symbol lookup.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{HistorySeries, QuoteRecord, Symbol};

/// Upstream failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The transport timed out. Treated identically to any other upstream
    /// failure; no in-request retry.
    Timeout,
    /// The upstream answered with a rate-limit notice.
    RateLimited,
    /// The payload carried no data for the requested symbol.
    NotFound,
    /// The payload could not be decoded into domain types.
    Malformed,
    /// Transport error or non-success status.
    Upstream,
}

/// Structured upstream error consumed by the fallback orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
}

impl FetchError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::RateLimited,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::NotFound,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Malformed,
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Upstream,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::Timeout => "upstream.timeout",
            FetchErrorKind::RateLimited => "upstream.rate_limited",
            FetchErrorKind::NotFound => "upstream.not_found",
            FetchErrorKind::Malformed => "upstream.malformed",
            FetchErrorKind::Upstream => "upstream.error",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for FetchError {}

/// Upstream market data source.
///
/// One outbound call per method, bounded by the adapter's own timeout.
/// Implementations must be `Send + Sync`; the orchestrator fans out over
/// symbols concurrently and shares the adapter across tasks.
pub trait QuoteSource: Send + Sync {
    /// Short stable identifier used in logs.
    fn id(&self) -> &'static str;

    /// Fetch one live quote.
    fn fetch_quote<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> Pin<Box<dyn Future<Output = Result<QuoteRecord, FetchError>> + Send + 'a>>;

    /// Fetch a daily series, truncated to the most recent `window` calendar
    /// entries and returned in ascending date order.
    fn fetch_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        window: usize,
    ) -> Pin<Box<dyn Future<Output = Result<HistorySeries, FetchError>> + Send + 'a>>;
}
