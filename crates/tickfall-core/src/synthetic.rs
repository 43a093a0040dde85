//! Synthetic data generation for the last rung of the fallback chain.
//!
//! Values are randomized but the shape never is: a requested window always
//! comes back full, gap-free, and in ascending date order, so downstream
//! chart code cannot tell a synthetic series from a real one structurally.

use std::collections::HashMap;

use crate::{HistoryPoint, HistorySeries, QuoteRecord, Symbol, UtcDateTime, HISTORY_WINDOW};

/// Tuning knobs and the per-symbol base price table.
///
/// The table anchors generated prices near each symbol's familiar range so
/// dashboards stay visually plausible; unknown symbols fall back to
/// `default_base_price`.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub base_prices: HashMap<String, f64>,
    pub default_base_price: f64,
    /// Bound on the one-shot quote perturbation, in percent.
    pub max_quote_drift_pct: f64,
    /// Bound on each daily step of the history walk, in percent.
    pub max_daily_step_pct: f64,
    pub min_volume: u64,
    pub max_volume: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        let base_prices = [
            ("AAPL", 170.0),
            ("TSLA", 240.0),
            ("BRK.B", 360.0),
            ("SCT", 1450.0),
        ]
        .into_iter()
        .map(|(symbol, price)| (String::from(symbol), price))
        .collect();

        Self {
            base_prices,
            default_base_price: 100.0,
            max_quote_drift_pct: 1.0,
            max_daily_step_pct: 2.0,
            min_volume: 500_000,
            max_volume: 1_500_000,
        }
    }
}

/// Generator for plausible quotes and daily series, flagged `is_real = false`.
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    config: SyntheticConfig,
}

impl SyntheticGenerator {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    fn base_price(&self, symbol: &Symbol) -> f64 {
        self.config
            .base_prices
            .get(symbol.as_str())
            .copied()
            .unwrap_or(self.config.default_base_price)
    }

    fn random_volume(&self) -> u64 {
        self.config.min_volume + fastrand::u64(..self.config.max_volume - self.config.min_volume)
    }

    /// One perturbed quote around the symbol's base price.
    pub fn quote(&self, symbol: &Symbol, now: UtcDateTime) -> QuoteRecord {
        let drift_pct = round2(signed_unit() * self.config.max_quote_drift_pct);
        let price = round2(self.base_price(symbol) * (1.0 + drift_pct / 100.0)).max(0.01);

        QuoteRecord::new(
            symbol.clone(),
            price,
            drift_pct,
            self.random_volume(),
            now,
            false,
        )
        .expect("synthetic quote values are positive and finite")
    }

    /// A geometric random walk seeded at the base price on the oldest day,
    /// emitted in chronological order up to and including `now`'s date.
    pub fn history(&self, symbol: &Symbol, now: UtcDateTime) -> HistorySeries {
        let today = now.calendar_date();
        let mut price = self.base_price(symbol);
        let mut points = Vec::with_capacity(HISTORY_WINDOW);

        for index in 0..HISTORY_WINDOW {
            let offset = (HISTORY_WINDOW - 1 - index) as u16;
            let date = today.minus_days(offset);
            let step_pct = signed_unit() * self.config.max_daily_step_pct;
            price = (price * (1.0 + step_pct / 100.0)).max(0.01);

            let point = HistoryPoint::new(date, round2(price).max(0.01), self.random_volume())
                .expect("synthetic closes are positive and finite");
            points.push(point);
        }

        HistorySeries::new(symbol.clone(), points, now, false)
            .expect("synthetic dates are strictly ascending")
    }
}

impl Default for SyntheticGenerator {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

/// Uniform draw from [-1.0, 1.0).
fn signed_unit() -> f64 {
    fastrand::f64() * 2.0 - 1.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
