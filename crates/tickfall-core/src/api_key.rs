//! API key plumbing.
//!
//! The key lives in an external settings store and can be rotated at any
//! time, so the adapter asks for it on every call instead of capturing it at
//! construction. [`CachedApiKey`] keeps the lookup cheap with a short
//! in-memory cache over whatever the host supplies.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default refresh interval for [`CachedApiKey`].
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(5 * 60);

const API_KEY_ENV: &str = "TICKFALL_ALPHAVANTAGE_API_KEY";

/// Source of the upstream API key, supplied by the host's settings layer.
pub trait ApiKeyProvider: Send + Sync {
    fn api_key(&self) -> String;
}

/// Fixed key, typically seeded from the environment.
#[derive(Debug, Clone)]
pub struct StaticApiKey(String);

impl StaticApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read the key from `TICKFALL_ALPHAVANTAGE_API_KEY`, falling back to
    /// the upstream's public demo key.
    pub fn from_env() -> Self {
        Self(std::env::var(API_KEY_ENV).unwrap_or_else(|_| String::from("demo")))
    }
}

impl ApiKeyProvider for StaticApiKey {
    fn api_key(&self) -> String {
        self.0.clone()
    }
}

struct CachedKey {
    value: String,
    fetched_at: Instant,
}

/// Decorator that re-reads the underlying provider after a TTL so rotated
/// keys are picked up without a restart.
pub struct CachedApiKey {
    inner: Arc<dyn ApiKeyProvider>,
    ttl: Duration,
    state: Mutex<Option<CachedKey>>,
}

impl CachedApiKey {
    pub fn new(inner: Arc<dyn ApiKeyProvider>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            state: Mutex::new(None),
        }
    }

    pub fn with_default_ttl(inner: Arc<dyn ApiKeyProvider>) -> Self {
        Self::new(inner, DEFAULT_KEY_TTL)
    }
}

impl ApiKeyProvider for CachedApiKey {
    fn api_key(&self) -> String {
        let mut state = self
            .state
            .lock()
            .expect("api key cache mutex is not poisoned");

        if let Some(cached) = state.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return cached.value.clone();
            }
        }

        let value = self.inner.api_key();
        *state = Some(CachedKey {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        reads: AtomicUsize,
    }

    impl ApiKeyProvider for CountingProvider {
        fn api_key(&self) -> String {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            format!("key-{n}")
        }
    }

    #[test]
    fn cached_key_reads_inner_once_within_ttl() {
        let provider = Arc::new(CountingProvider {
            reads: AtomicUsize::new(0),
        });
        let cached = CachedApiKey::new(provider.clone(), Duration::from_secs(60));

        assert_eq!(cached.api_key(), "key-0");
        assert_eq!(cached.api_key(), "key-0");
        assert_eq!(provider.reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cached_key_refreshes_after_ttl() {
        let provider = Arc::new(CountingProvider {
            reads: AtomicUsize::new(0),
        });
        let cached = CachedApiKey::new(provider.clone(), Duration::ZERO);

        assert_eq!(cached.api_key(), "key-0");
        assert_eq!(cached.api_key(), "key-1");
        assert_eq!(provider.reads.load(Ordering::SeqCst), 2);
    }
}
