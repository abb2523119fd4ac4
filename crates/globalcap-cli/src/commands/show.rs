use std::path::Path;

use globalcap_core::output::format_large_number;
use globalcap_core::Warehouse;
use globalcap_warehouse::{SnapshotRow, SnapshotRun};

use crate::cli::ShowArgs;
use crate::error::CliError;

use super::{fit, open_warehouse};

pub fn run(args: &ShowArgs, warehouse_path: Option<&Path>) -> Result<(), CliError> {
    let warehouse = open_warehouse(warehouse_path)?;

    if args.runs {
        let runs = warehouse.snapshot_runs()?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&runs)?);
        } else {
            print!("{}", render_runs(&runs));
        }
        return Ok(());
    }

    let (date, rows) = load_rows(&warehouse, args.date.as_deref(), args.limit)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("snapshot {date}");
        print!("{}", render_rows(&rows));
    }
    Ok(())
}

fn load_rows(
    warehouse: &Warehouse,
    date: Option<&str>,
    limit: usize,
) -> Result<(String, Vec<SnapshotRow>), CliError> {
    let date = match date {
        Some(date) => date.trim().to_owned(),
        None => warehouse
            .snapshot_dates()?
            .into_iter()
            .next()
            .ok_or(CliError::SnapshotMissing { date: None })?,
    };

    let mut rows = warehouse.load_snapshot(&date)?;
    if rows.is_empty() {
        return Err(CliError::SnapshotMissing { date: Some(date) });
    }
    rows.truncate(limit);
    Ok((date, rows))
}

fn render_rows(rows: &[SnapshotRow]) -> String {
    let mut out = format!(
        "{:>4}  {:<12} {:<28} {:>10}  {:<9} {:<8} {}\n",
        "RANK", "TICKER", "NAME", "MCAP (USD)", "TYPE", "CCY", "PRICE"
    );
    for row in rows {
        out.push_str(&format!(
            "{:>4}  {:<12} {:<28} {:>10}  {:<9} {:<8} {:.2}\n",
            row.rank,
            row.ticker,
            fit(&row.name, 28),
            format_large_number(row.market_cap_usd),
            row.asset_type,
            row.currency,
            row.current_price
        ));
    }
    out
}

fn render_runs(runs: &[SnapshotRun]) -> String {
    let mut out = format!("{:<12} {:>6}  {:<7} {}\n", "DATE", "ROWS", "CLEARED", "RUN");
    for run in runs {
        out.push_str(&format!(
            "{:<12} {:>6}  {:<7} {}\n",
            run.snapshot_date, run.row_count, run.cleared, run.run_id
        ));
    }
    out
}
