//! Session-aware cache TTL policy.

use std::time::Duration;

use crate::market_clock::SessionTier;
use crate::DataKind;

/// TTL table keyed by data kind and session tier.
///
/// Live quotes go stale in minutes while the market trades; after the close
/// the last print stays valid for hours, and over a weekend no new prints
/// arrive until the next session. The magnitudes are tunable defaults, not
/// invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub quote_open: Duration,
    pub quote_closed_weekday: Duration,
    pub quote_closed_weekend: Duration,
    pub history_open: Duration,
    pub history_closed_weekday: Duration,
    pub history_closed_weekend: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            quote_open: Duration::from_secs(10 * 60),
            quote_closed_weekday: Duration::from_secs(4 * 60 * 60),
            quote_closed_weekend: Duration::from_secs(24 * 60 * 60),
            history_open: Duration::from_secs(60 * 60),
            history_closed_weekday: Duration::from_secs(12 * 60 * 60),
            history_closed_weekend: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl TtlPolicy {
    pub fn ttl_for(&self, kind: DataKind, tier: SessionTier) -> Duration {
        match (kind, tier) {
            (DataKind::Quote, SessionTier::Open) => self.quote_open,
            (DataKind::Quote, SessionTier::ClosedWeekday) => self.quote_closed_weekday,
            (DataKind::Quote, SessionTier::ClosedWeekend) => self.quote_closed_weekend,
            (DataKind::History, SessionTier::Open) => self.history_open,
            (DataKind::History, SessionTier::ClosedWeekday) => self.history_closed_weekday,
            (DataKind::History, SessionTier::ClosedWeekend) => self.history_closed_weekend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_ttl_grows_as_the_session_closes() {
        let policy = TtlPolicy::default();

        let open = policy.ttl_for(DataKind::Quote, SessionTier::Open);
        let weekday = policy.ttl_for(DataKind::Quote, SessionTier::ClosedWeekday);
        let weekend = policy.ttl_for(DataKind::Quote, SessionTier::ClosedWeekend);

        assert!(open < weekday);
        assert!(weekday < weekend);
    }

    #[test]
    fn history_outlives_quotes_during_trading() {
        let policy = TtlPolicy::default();

        assert!(
            policy.ttl_for(DataKind::History, SessionTier::Open)
                > policy.ttl_for(DataKind::Quote, SessionTier::Open)
        );
    }
}
