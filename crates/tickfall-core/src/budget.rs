//! Daily upstream call budget.
//!
//! The ledger lives in the store, one row per calendar day, so the budget
//! survives restarts. Day rollover is implicit: the first call of a new day
//! inserts a new row and prior days remain as history.

use std::sync::Mutex;
use std::time::Duration;

use tickfall_store::{Store, StoreError};

use crate::UtcDateTime;

/// Budget limits. Both values are policy, not law: observed deployments
/// ranged from 5 minutes to 1 hour of spacing, always 25 calls per day.
/// The daily limit is shared across all symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetPolicy {
    pub daily_limit: u32,
    pub min_interval: Duration,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            daily_limit: 25,
            min_interval: Duration::from_secs(60 * 60),
        }
    }
}

/// Grants or denies permission to call the upstream source.
///
/// `can_call` and `record_call` are total operations; any store failure
/// reads as "budget exhausted", the safe default. Callers that intend to
/// check and then call must go through [`CallBudget::try_acquire`], which
/// serializes the check-then-increment so concurrent tasks cannot overrun
/// the daily limit.
pub struct CallBudget {
    store: Store,
    policy: BudgetPolicy,
    gate: Mutex<()>,
}

impl CallBudget {
    pub fn new(store: Store, policy: BudgetPolicy) -> Self {
        Self {
            store,
            policy,
            gate: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> BudgetPolicy {
        self.policy
    }

    /// Whether a call would be allowed right now. Read-only.
    pub fn can_call(&self, now: UtcDateTime) -> bool {
        let today = now.calendar_date().format_calendar();
        let row = match self.store.budget_for(&today) {
            Ok(row) => row,
            Err(_) => return false,
        };

        let (call_count, last_call_at) = match row {
            None => (0, None),
            Some(row) => (row.call_count, row.last_call_at),
        };

        if call_count >= i64::from(self.policy.daily_limit) {
            return false;
        }

        match last_call_at.as_deref() {
            None => true,
            Some(raw) => match UtcDateTime::parse(raw) {
                Ok(last_call) => {
                    now.since(last_call).as_seconds_f64() >= self.policy.min_interval.as_secs_f64()
                }
                // A ledger we cannot read is a ledger we do not trust.
                Err(_) => false,
            },
        }
    }

    /// Record one upstream call against today's ledger row.
    pub fn record_call(&self, now: UtcDateTime) -> Result<(), StoreError> {
        let today = now.calendar_date().format_calendar();
        self.store.record_call(&today, &now.format_rfc3339())
    }

    /// Atomic check-then-increment. Returns true when the caller may issue
    /// exactly one upstream call, which has already been counted.
    pub fn try_acquire(&self, now: UtcDateTime) -> bool {
        let _gate = self
            .gate
            .lock()
            .expect("call budget gate is not poisoned");

        if !self.can_call(now) {
            return false;
        }

        self.record_call(now).is_ok()
    }
}
