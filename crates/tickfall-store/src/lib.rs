//! # Tickfall Store
//!
//! DuckDB-based persistence for the tickfall data engine.
//!
//! The store owns three tables:
//!
//! | Table | Description |
//! |-------|-------------|
//! | `quote_snapshots` | Append-only quote records; latest row per symbol is the cache entry |
//! | `history_points` | Daily close/volume points, upserted by `(symbol, date)` |
//! | `api_budget` | One row per calendar day: upstream call count and last call time |
//!
//! Quote rows are never updated in place: a refresh appends a superseding row
//! and readers take the newest `fetched_at`. History rows are upserted so a
//! partial refresh overwrites only the days it actually fetched. Budget rows
//! roll over by key: a new day inserts a new `call_date` row and prior days
//! remain as history.
//!
//! All statements are parameterized; caller-supplied symbols are never
//! interpolated into SQL.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tickfall_store::{Store, StoreConfig};
//!
//! fn main() -> Result<(), tickfall_store::StoreError> {
//!     let store = Store::open_default()?;
//!     let latest = store.latest_quote("AAPL")?;
//!     println!("cached: {latest:?}");
//!     Ok(())
//! }
//! ```

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::ToSql;
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{AccessMode, DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Configuration for the store database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory for tickfall data.
    pub data_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of connections in the pool.
    pub max_pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let data_home = resolve_data_home();
        let db_path = data_home.join("tickfall.duckdb");
        Self {
            data_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// A persisted quote snapshot row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteRow {
    /// Stock symbol (e.g., "AAPL").
    pub symbol: String,
    /// Last known price.
    pub price: f64,
    /// Signed percentage change.
    pub change_percent: f64,
    /// Trade volume.
    pub volume: i64,
    /// True when the row came from the upstream source, false when synthesized.
    pub is_real: bool,
    /// Acquisition timestamp as RFC3339 UTC string.
    pub fetched_at: String,
}

/// A persisted daily history point row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    /// Stock symbol.
    pub symbol: String,
    /// Calendar date as `YYYY-MM-DD`.
    pub date: String,
    /// Daily closing price.
    pub close: f64,
    /// Daily volume.
    pub volume: i64,
    /// Provenance flag for this point.
    pub is_real: bool,
    /// Acquisition timestamp as RFC3339 UTC string.
    pub fetched_at: String,
}

/// One calendar day of the upstream call ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetRow {
    /// Calendar day as `YYYY-MM-DD`.
    pub call_date: String,
    /// Number of upstream calls recorded for the day.
    pub call_count: i64,
    /// Timestamp of the most recent call, RFC3339 UTC.
    pub last_call_at: Option<String>,
}

/// The persistence handle shared by the cache and the budget governor.
#[derive(Clone)]
pub struct Store {
    config: StoreConfig,
    manager: DuckDbConnectionManager,
}

impl Store {
    /// Open a store with default configuration.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(StoreConfig::default())
    }

    /// Open a store with the specified configuration.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::new(config.db_path.clone(), config.max_pool_size);
        let store = Self { config, manager };
        store.initialize()?;
        Ok(store)
    }

    /// Apply schema migrations. Safe to call repeatedly.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Root data directory this store was opened under.
    pub fn data_home(&self) -> &Path {
        self.config.data_home.as_path()
    }

    /// Append a quote snapshot. Existing rows for the symbol are left in
    /// place; readers pick the newest `fetched_at`.
    pub fn insert_quote(&self, row: &QuoteRow) -> Result<(), StoreError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        let params: [&dyn ToSql; 6] = [
            &row.symbol,
            &row.price,
            &row.change_percent,
            &row.volume,
            &row.is_real,
            &row.fetched_at,
        ];
        connection.execute(
            "INSERT OR REPLACE INTO quote_snapshots \
             (symbol, price, change_percent, volume, is_real, fetched_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
            params.as_slice(),
        )?;
        Ok(())
    }

    /// Most recent quote snapshot for a symbol, if any.
    pub fn latest_quote(&self, symbol: &str) -> Result<Option<QuoteRow>, StoreError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT symbol, price, change_percent, volume, is_real, fetched_at \
             FROM quote_snapshots \
             WHERE symbol = ? \
             ORDER BY fetched_at DESC \
             LIMIT 1",
        )?;

        let params: [&dyn ToSql; 1] = [&symbol];
        let result = statement.query_row(params.as_slice(), |row| {
            Ok(QuoteRow {
                symbol: row.get(0)?,
                price: row.get(1)?,
                change_percent: row.get(2)?,
                volume: row.get(3)?,
                is_real: row.get(4)?,
                fetched_at: row.get(5)?,
            })
        });

        match result {
            Ok(row) => Ok(Some(row)),
            Err(::duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Upsert a batch of history points in one transaction.
    pub fn upsert_history(&self, rows: &[HistoryRow]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }

        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), StoreError> {
            for row in rows {
                let params: [&dyn ToSql; 6] = [
                    &row.symbol,
                    &row.date,
                    &row.close,
                    &row.volume,
                    &row.is_real,
                    &row.fetched_at,
                ];
                connection.execute(
                    "INSERT INTO history_points \
                     (symbol, date, close, volume, is_real, fetched_at) \
                     VALUES (?, ?, ?, ?, ?, ?) \
                     ON CONFLICT (symbol, date) DO UPDATE SET \
                     close = excluded.close, \
                     volume = excluded.volume, \
                     is_real = excluded.is_real, \
                     fetched_at = excluded.fetched_at",
                    params.as_slice(),
                )?;
            }
            Ok(())
        })();

        finalize_transaction(&connection, result)
    }

    /// The most recent `limit` history points for a symbol, in ascending
    /// date order.
    pub fn history_window(&self, symbol: &str, limit: usize) -> Result<Vec<HistoryRow>, StoreError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT symbol, date, close, volume, is_real, fetched_at FROM ( \
                 SELECT symbol, date, close, volume, is_real, fetched_at \
                 FROM history_points \
                 WHERE symbol = ? \
                 ORDER BY date DESC \
                 LIMIT ? \
             ) ORDER BY date ASC",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let params: [&dyn ToSql; 2] = [&symbol, &limit];
        let mut rows_cursor = statement.query(params.as_slice())?;
        let mut rows = Vec::new();
        while let Some(row) = rows_cursor.next()? {
            rows.push(HistoryRow {
                symbol: row.get(0)?,
                date: row.get(1)?,
                close: row.get(2)?,
                volume: row.get(3)?,
                is_real: row.get(4)?,
                fetched_at: row.get(5)?,
            });
        }
        Ok(rows)
    }

    /// The budget ledger row for a calendar day, if one exists yet.
    pub fn budget_for(&self, call_date: &str) -> Result<Option<BudgetRow>, StoreError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT call_date, call_count, last_call_at \
             FROM api_budget \
             WHERE call_date = ?",
        )?;

        let params: [&dyn ToSql; 1] = [&call_date];
        let result = statement.query_row(params.as_slice(), |row| {
            Ok(BudgetRow {
                call_date: row.get(0)?,
                call_count: row.get(1)?,
                last_call_at: row.get(2)?,
            })
        });

        match result {
            Ok(row) => Ok(Some(row)),
            Err(::duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    /// Record one upstream call against a calendar day. Creates the day's
    /// row on first call; increments in place afterwards.
    pub fn record_call(&self, call_date: &str, now: &str) -> Result<(), StoreError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        let params: [&dyn ToSql; 2] = [&call_date, &now];
        connection.execute(
            "INSERT INTO api_budget (call_date, call_count, last_call_at) \
             VALUES (?, 1, ?) \
             ON CONFLICT (call_date) DO UPDATE SET \
             call_count = call_count + 1, \
             last_call_at = excluded.last_call_at",
            params.as_slice(),
        )?;
        Ok(())
    }
}

fn finalize_transaction<T>(
    connection: &::duckdb::Connection,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn resolve_data_home() -> PathBuf {
    if let Some(path) = env::var_os("TICKFALL_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".tickfall");
    }

    PathBuf::from(".tickfall")
}
