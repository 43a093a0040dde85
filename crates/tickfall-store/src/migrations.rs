//! Schema bootstrap for the tickfall store.

use ::duckdb::Connection;

/// Apply the store schema.
///
/// Every statement is idempotent; the store calls this on every open so a
/// fresh database file and an existing one go through the same path.
///
/// # Errors
/// Returns an error if any schema statement fails to execute.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE TABLE IF NOT EXISTS quote_snapshots (
    symbol         TEXT NOT NULL,
    price          DOUBLE NOT NULL,
    change_percent DOUBLE NOT NULL,
    volume         BIGINT NOT NULL,
    is_real        BOOLEAN NOT NULL,
    fetched_at     TEXT NOT NULL,
    PRIMARY KEY (symbol, fetched_at)
);

CREATE TABLE IF NOT EXISTS history_points (
    symbol     TEXT NOT NULL,
    date       TEXT NOT NULL,
    close      DOUBLE NOT NULL,
    volume     BIGINT NOT NULL,
    is_real    BOOLEAN NOT NULL,
    fetched_at TEXT NOT NULL,
    PRIMARY KEY (symbol, date)
);

CREATE TABLE IF NOT EXISTS api_budget (
    call_date    TEXT PRIMARY KEY,
    call_count   BIGINT NOT NULL DEFAULT 0,
    last_call_at TEXT
);
",
    )
}
