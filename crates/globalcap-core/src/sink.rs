//! Persistence boundary for ranked snapshots.

use globalcap_warehouse::{SnapshotRow, UpsertReport, Warehouse, WarehouseError};
use thiserror::Error;
use time::format_description::well_known::Iso8601;
use time::Date;
use tracing::info;

use crate::RankedAsset;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("refusing to persist an empty snapshot")]
    EmptySnapshot,

    #[error("invalid snapshot date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("snapshot upload needs the run id of the run that produced it")]
    MissingRunId,

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

/// Accepts a ranked list for one day, upserting by `(ticker, snapshot_date)`.
///
/// `run_id` is the pipeline run's id so the audit trail matches its report.
pub trait SnapshotSink: Send + Sync {
    fn persist(
        &self,
        run_id: &str,
        snapshot_date: Date,
        assets: &[RankedAsset],
        clear_existing: bool,
    ) -> Result<UpsertReport, SinkError>;
}

impl SnapshotSink for Warehouse {
    fn persist(
        &self,
        run_id: &str,
        snapshot_date: Date,
        assets: &[RankedAsset],
        clear_existing: bool,
    ) -> Result<UpsertReport, SinkError> {
        if assets.is_empty() {
            return Err(SinkError::EmptySnapshot);
        }
        let run_id = run_id.trim();
        if run_id.is_empty() {
            return Err(SinkError::MissingRunId);
        }

        let date = format_snapshot_date(snapshot_date)?;
        let rows: Vec<SnapshotRow> = assets.iter().map(snapshot_row).collect();

        let report = self.upsert_snapshot(run_id, &date, &rows, clear_existing)?;
        info!(
            run_id = %report.run_id,
            snapshot_date = %report.snapshot_date,
            inserted = report.inserted,
            replaced = report.replaced,
            cleared = report.cleared,
            "snapshot persisted"
        );
        Ok(report)
    }
}

pub fn snapshot_row(ranked: &RankedAsset) -> SnapshotRow {
    let asset = &ranked.asset;
    SnapshotRow {
        ticker: asset.ticker().to_string(),
        name: asset.name().to_owned(),
        rank: ranked.rank,
        market_cap_usd: asset.market_cap_usd(),
        current_price: asset.current_price(),
        previous_close: asset.previous_close(),
        percentage_change: asset.percentage_change(),
        volume: asset.volume(),
        primary_exchange: asset.primary_exchange().to_owned(),
        country: asset.country().to_owned(),
        sector: asset.sector().to_owned(),
        industry: asset.industry().to_owned(),
        asset_type: asset.asset_type().as_str().to_owned(),
        image: asset.image().map(str::to_owned),
        currency: asset.currency().to_owned(),
    }
}

pub fn format_snapshot_date(date: Date) -> Result<String, SinkError> {
    date.format(&Iso8601::DATE).map_err(|_| SinkError::InvalidDate {
        value: date.to_string(),
    })
}

pub fn parse_snapshot_date(value: &str) -> Result<Date, SinkError> {
    Date::parse(value.trim(), &Iso8601::DATE).map_err(|_| SinkError::InvalidDate {
        value: value.to_owned(),
    })
}
