//! # Globalcap Warehouse
//!
//! DuckDB-backed snapshot store for ranked asset lists.
//!
//! ## Overview
//!
//! Each pipeline run produces one dated snapshot: the top-N assets ranked by
//! USD market capitalization. The warehouse persists those rows keyed by
//! `(ticker, snapshot_date)`, so uploading the same day twice overwrites the
//! earlier rows instead of duplicating them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use globalcap_warehouse::{SnapshotRow, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     let rows: Vec<SnapshotRow> = Vec::new();
//!
//!     let report = warehouse.upsert_snapshot("run-0001", "2026-10-15", &rows, false)?;
//!     println!("inserted {} replaced {}", report.inserted, report.replaced);
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `asset_snapshots` | Ranked assets, primary key `(ticker, snapshot_date)` |
//! | `snapshot_runs` | One audit row per upload |
//! | `schema_migrations` | Applied migration versions |

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{Connection, ToSql};
use serde::Serialize;
use thiserror::Error;

pub use duckdb::{AccessMode, DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Snapshot rejected before it touched the database.
    #[error("snapshot rejected: {0}")]
    Rejected(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for globalcap data.
    pub globalcap_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept per access mode.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let globalcap_home = resolve_globalcap_home();
        let db_path = globalcap_home.join("snapshots.duckdb");
        Self {
            globalcap_home,
            db_path,
            max_pool_size: 2,
        }
    }
}

impl WarehouseConfig {
    /// Configuration for a database file at an explicit path.
    pub fn at_path(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let globalcap_home = db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(resolve_globalcap_home);
        Self {
            globalcap_home,
            db_path,
            max_pool_size: 2,
        }
    }
}

/// One persisted asset of a dated snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    pub ticker: String,
    pub name: String,
    pub rank: u32,
    /// Market capitalization in USD.
    pub market_cap_usd: f64,
    /// Prices stay in the listing's native currency.
    pub current_price: f64,
    pub previous_close: f64,
    pub percentage_change: f64,
    pub volume: f64,
    pub primary_exchange: String,
    pub country: String,
    pub sector: String,
    pub industry: String,
    pub asset_type: String,
    pub image: Option<String>,
    pub currency: String,
}

/// Outcome of a snapshot upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    pub run_id: String,
    pub snapshot_date: String,
    /// Rows whose `(ticker, snapshot_date)` key did not exist yet.
    pub inserted: usize,
    /// Rows that overwrote an existing key.
    pub replaced: usize,
    /// Rows removed up front because `clear_existing` was requested.
    pub cleared: usize,
}

/// Audit entry written once per upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRun {
    pub run_id: String,
    pub snapshot_date: String,
    pub row_count: i64,
    pub cleared: bool,
}

/// The snapshot store.
#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::new(config.db_path.clone(), config.max_pool_size);
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Upsert a ranked snapshot keyed by `(ticker, snapshot_date)`.
    ///
    /// A duplicate key is treated as an update, never as an error. With
    /// `clear_existing` every row of `snapshot_date` is deleted first, so
    /// tickers that dropped out of today's ranking do not linger.
    ///
    /// The whole upload runs in one transaction.
    pub fn upsert_snapshot(
        &self,
        run_id: &str,
        snapshot_date: &str,
        rows: &[SnapshotRow],
        clear_existing: bool,
    ) -> Result<UpsertReport, WarehouseError> {
        validate_snapshot_date(snapshot_date)?;
        validate_unique_tickers(rows)?;

        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<UpsertReport, WarehouseError> {
            let mut report = UpsertReport {
                run_id: run_id.to_owned(),
                snapshot_date: snapshot_date.to_owned(),
                inserted: 0,
                replaced: 0,
                cleared: 0,
            };

            if clear_existing {
                report.cleared = connection.execute(
                    "DELETE FROM asset_snapshots WHERE snapshot_date = CAST(? AS DATE)",
                    [snapshot_date],
                )?;
            }

            for row in rows {
                let existing: i64 = connection.query_row(
                    "SELECT COUNT(*) FROM asset_snapshots \
                     WHERE ticker = ? AND snapshot_date = CAST(? AS DATE)",
                    [row.ticker.as_str(), snapshot_date],
                    |result| result.get(0),
                )?;

                let rank = i64::from(row.rank);
                let params: [&dyn ToSql; 17] = [
                    &row.ticker,
                    &snapshot_date,
                    &rank,
                    &row.name,
                    &row.market_cap_usd,
                    &row.current_price,
                    &row.previous_close,
                    &row.percentage_change,
                    &row.volume,
                    &row.primary_exchange,
                    &row.country,
                    &row.sector,
                    &row.industry,
                    &row.asset_type,
                    &row.image,
                    &row.currency,
                    &run_id,
                ];
                connection.execute(
                    "INSERT OR REPLACE INTO asset_snapshots \
                     (ticker, snapshot_date, rank, name, market_cap_usd, current_price, \
                      previous_close, percentage_change, volume, primary_exchange, country, \
                      sector, industry, asset_type, image, currency, run_id, updated_at) \
                     VALUES (?, CAST(? AS DATE), ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, \
                             CURRENT_TIMESTAMP)",
                    params.as_slice(),
                )?;

                if existing > 0 {
                    report.replaced += 1;
                } else {
                    report.inserted += 1;
                }
            }

            let row_count = rows.len() as i64;
            let params: [&dyn ToSql; 4] = [&run_id, &snapshot_date, &row_count, &clear_existing];
            connection.execute(
                "INSERT INTO snapshot_runs (run_id, snapshot_date, row_count, cleared, uploaded_at) \
                 VALUES (?, CAST(? AS DATE), ?, ?, CURRENT_TIMESTAMP)",
                params.as_slice(),
            )?;

            Ok(report)
        })();

        finalize_transaction(&connection, result)
    }

    /// Read a stored snapshot back in rank order.
    pub fn load_snapshot(&self, snapshot_date: &str) -> Result<Vec<SnapshotRow>, WarehouseError> {
        validate_snapshot_date(snapshot_date)?;

        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT ticker, name, rank, market_cap_usd, current_price, previous_close, \
                    percentage_change, volume, primary_exchange, country, sector, industry, \
                    asset_type, image, currency \
             FROM asset_snapshots \
             WHERE snapshot_date = CAST(? AS DATE) \
             ORDER BY rank ASC, ticker ASC",
        )?;

        let rows = statement.query_map([snapshot_date], |row| {
            let rank: i64 = row.get(2)?;
            Ok(SnapshotRow {
                ticker: row.get(0)?,
                name: row.get(1)?,
                rank: u32::try_from(rank).unwrap_or(u32::MAX),
                market_cap_usd: row.get(3)?,
                current_price: row.get(4)?,
                previous_close: row.get(5)?,
                percentage_change: row.get(6)?,
                volume: row.get(7)?,
                primary_exchange: row.get(8)?,
                country: row.get(9)?,
                sector: row.get(10)?,
                industry: row.get(11)?,
                asset_type: row.get(12)?,
                image: row.get(13)?,
                currency: row.get(14)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(WarehouseError::from)
    }

    /// Snapshot dates present in the store, newest first.
    pub fn snapshot_dates(&self) -> Result<Vec<String>, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT DISTINCT CAST(snapshot_date AS VARCHAR) AS day \
             FROM asset_snapshots ORDER BY day DESC",
        )?;
        let dates = statement.query_map([], |row| row.get::<_, String>(0))?;
        dates
            .collect::<Result<Vec<_>, _>>()
            .map_err(WarehouseError::from)
    }

    /// Upload audit trail, most recent first.
    pub fn snapshot_runs(&self) -> Result<Vec<SnapshotRun>, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT run_id, CAST(snapshot_date AS VARCHAR), row_count, cleared \
             FROM snapshot_runs ORDER BY uploaded_at DESC, run_id ASC",
        )?;
        let runs = statement.query_map([], |row| {
            Ok(SnapshotRun {
                run_id: row.get(0)?,
                snapshot_date: row.get(1)?,
                row_count: row.get(2)?,
                cleared: row.get(3)?,
            })
        })?;
        runs.collect::<Result<Vec<_>, _>>()
            .map_err(WarehouseError::from)
    }
}

/// Commit on success, roll back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
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

/// Dates travel as `YYYY-MM-DD` strings and are cast by DuckDB.
fn validate_snapshot_date(value: &str) -> Result<(), WarehouseError> {
    let bytes = value.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(index, byte)| index == 4 || index == 7 || byte.is_ascii_digit());

    if shaped {
        Ok(())
    } else {
        Err(WarehouseError::Rejected(format!(
            "snapshot date must be YYYY-MM-DD, got '{value}'"
        )))
    }
}

fn validate_unique_tickers(rows: &[SnapshotRow]) -> Result<(), WarehouseError> {
    let mut seen = std::collections::HashSet::with_capacity(rows.len());
    for row in rows {
        if row.ticker.trim().is_empty() {
            return Err(WarehouseError::Rejected(String::from(
                "snapshot row has an empty ticker",
            )));
        }
        if !seen.insert(row.ticker.as_str()) {
            return Err(WarehouseError::Rejected(format!(
                "ticker '{}' appears twice in one snapshot",
                row.ticker
            )));
        }
    }
    Ok(())
}

fn resolve_globalcap_home() -> PathBuf {
    if let Ok(path) = env::var("GLOBALCAP_HOME") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Ok(home) = env::var("HOME") {
        return PathBuf::from(home).join(".globalcap");
    }

    PathBuf::from(".globalcap")
}
