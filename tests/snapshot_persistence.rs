//! Behavior-driven tests for snapshot persistence
//!
//! Uploads go through the `SnapshotSink` implementation of the DuckDB
//! warehouse, exactly as the CLI uses it.

use globalcap_core::{
    AssetDraft, AssetRecord, AssetType, RankedAsset, SinkError, SnapshotSink, Warehouse,
    WarehouseConfig,
};
use tempfile::{tempdir, TempDir};
use time::{Date, Month};

const RUN_ID: &str = "3f1c6a2e-run";

fn open_warehouse(temp: &TempDir) -> Warehouse {
    Warehouse::open(WarehouseConfig::at_path(temp.path().join("snapshots.duckdb")))
        .expect("warehouse open")
}

fn day(day: u8) -> Date {
    Date::from_calendar_date(2024, Month::June, day).expect("valid date")
}

fn ranked(entries: &[(&str, f64)]) -> Vec<RankedAsset> {
    entries
        .iter()
        .zip(1_u32..)
        .map(|((ticker, market_cap_usd), rank)| RankedAsset {
            rank,
            asset: AssetRecord::new(AssetDraft {
                ticker: (*ticker).to_owned(),
                name: format!("{ticker} Group"),
                market_cap_usd: *market_cap_usd,
                current_price: 50.0,
                previous_close: 49.0,
                primary_exchange: String::from("NYSE"),
                country: String::from("US"),
                asset_type: AssetType::Stock,
                ..AssetDraft::default()
            })
            .expect("fixture record should be valid"),
        })
        .collect()
}

// =============================================================================
// Warehouse: Same-day uploads
// =============================================================================

#[test]
fn when_the_same_day_is_uploaded_twice_rows_are_overwritten_not_duplicated() {
    // Given: a stored snapshot for June 1st
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    let first = ranked(&[("AAA", 3e9), ("BBB", 2e9), ("CCC", 1e9)]);
    warehouse.persist(RUN_ID, day(1), &first, false).expect("first upload");

    // When: the same tickers are uploaded again with new figures
    let second = ranked(&[("BBB", 4e9), ("AAA", 3.5e9), ("CCC", 1e9)]);
    let report = warehouse.persist(RUN_ID, day(1), &second, false).expect("second upload");

    // Then: the row count is unchanged and the new figures won
    assert_eq!(report.inserted, 0);
    assert_eq!(report.replaced, 3);
    let rows = warehouse.load_snapshot("2024-06-01").expect("load");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].ticker, "BBB");
    assert_eq!(rows[0].market_cap_usd, 4e9);
    assert_eq!(rows[0].rank, 1);
}

#[test]
fn when_clear_is_requested_tickers_missing_from_the_new_upload_disappear() {
    // Given: a snapshot that still contains a ticker which fell out of the ranking
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    warehouse
        .persist(RUN_ID, day(2), &ranked(&[("AAA", 3e9), ("OLD", 2e9)]), false)
        .expect("first upload");

    // When: the day is uploaded again with clear
    let report = warehouse
        .persist(RUN_ID, day(2), &ranked(&[("AAA", 3e9), ("NEW", 2.5e9)]), true)
        .expect("clearing upload");

    // Then: only the new ranking remains
    assert_eq!(report.cleared, 2);
    assert_eq!(report.inserted, 2);
    let tickers: Vec<String> = warehouse
        .load_snapshot("2024-06-02")
        .expect("load")
        .into_iter()
        .map(|row| row.ticker)
        .collect();
    assert_eq!(tickers, vec!["AAA", "NEW"]);
}

#[test]
fn when_clear_is_not_requested_stale_tickers_are_kept() {
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    warehouse
        .persist(RUN_ID, day(3), &ranked(&[("AAA", 3e9), ("OLD", 2e9)]), false)
        .expect("first upload");

    warehouse
        .persist(RUN_ID, day(3), &ranked(&[("AAA", 3e9), ("NEW", 2.5e9)]), false)
        .expect("second upload");

    assert_eq!(warehouse.load_snapshot("2024-06-03").expect("load").len(), 3);
}

// =============================================================================
// Warehouse: Dates and audit trail
// =============================================================================

#[test]
fn when_different_days_are_uploaded_each_snapshot_stays_separate() {
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    warehouse
        .persist(RUN_ID, day(4), &ranked(&[("AAA", 3e9)]), false)
        .expect("upload day 4");
    warehouse
        .persist(RUN_ID, day(5), &ranked(&[("AAA", 3.1e9), ("BBB", 1e9)]), true)
        .expect("upload day 5");

    assert_eq!(
        warehouse.snapshot_dates().expect("dates"),
        vec!["2024-06-05", "2024-06-04"]
    );
    assert_eq!(warehouse.load_snapshot("2024-06-04").expect("load").len(), 1);
    assert_eq!(warehouse.load_snapshot("2024-06-05").expect("load").len(), 2);

    let runs = warehouse.snapshot_runs().expect("runs");
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().any(|run| run.snapshot_date == "2024-06-05" && run.cleared));
}

#[test]
fn when_a_run_is_persisted_its_audit_row_carries_the_run_id() {
    // Given: the id a pipeline run put in its report
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);
    let run_id = "9b2e4f70-5a1d-4c7e-8f3b-2d6a1e0c9b44";

    // When: the ranking is persisted under that id
    let report = warehouse
        .persist(run_id, day(8), &ranked(&[("AAA", 3e9), ("BBB", 2e9)]), false)
        .expect("upload");

    // Then: the upsert report and the audit trail both use it
    assert_eq!(report.run_id, run_id);
    let runs = warehouse.snapshot_runs().expect("runs");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id, run_id);
    assert_eq!(runs[0].row_count, 2);
}

#[test]
fn when_the_warehouse_is_reopened_snapshots_are_still_there() {
    let temp = tempdir().expect("tempdir");
    {
        let warehouse = open_warehouse(&temp);
        warehouse
            .persist(RUN_ID, day(6), &ranked(&[("AAA", 3e9), ("BBB", 2e9)]), false)
            .expect("upload");
    }

    let reopened = open_warehouse(&temp);
    let rows = reopened.load_snapshot("2024-06-06").expect("load");

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].ticker, "BBB");
    assert_eq!(rows[1].rank, 2);
}

#[test]
fn when_an_empty_ranking_is_persisted_it_is_refused() {
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp);

    assert!(matches!(
        warehouse.persist(RUN_ID, day(7), &[], false),
        Err(SinkError::EmptySnapshot)
    ));
    assert!(warehouse.snapshot_dates().expect("dates").is_empty());
}
