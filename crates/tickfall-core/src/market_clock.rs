//! Market session oracle.
//!
//! Pure functions of wall-clock time; the session tier drives TTL selection.
//! The model is deliberately simple: weekends are closed, weekday hours
//! 9:00-15:59 in the host clock's offset are open. Exchange holidays and
//! proper exchange-timezone conversion are not modeled.

use time::{OffsetDateTime, Weekday};

const OPEN_HOUR: u8 = 9;
const CLOSE_HOUR: u8 = 16;

/// Session tier used to pick a cache TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionTier {
    /// Weekday, trading hours.
    Open,
    /// Weekday, outside trading hours.
    ClosedWeekday,
    /// Saturday or Sunday.
    ClosedWeekend,
}

impl SessionTier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::ClosedWeekday => "closed_weekday",
            Self::ClosedWeekend => "closed_weekend",
        }
    }
}

/// Whether the market is trading at `now`.
pub fn is_market_open(now: OffsetDateTime) -> bool {
    session_tier(now) == SessionTier::Open
}

/// Classify `now` into a session tier.
pub fn session_tier(now: OffsetDateTime) -> SessionTier {
    if matches!(now.weekday(), Weekday::Saturday | Weekday::Sunday) {
        return SessionTier::ClosedWeekend;
    }

    if (OPEN_HOUR..CLOSE_HOUR).contains(&now.hour()) {
        SessionTier::Open
    } else {
        SessionTier::ClosedWeekday
    }
}
