use std::path::Path;

use globalcap_core::config::{default_curated_symbols, DEFAULT_SCREENER_COUNTRIES};
use globalcap_core::output::{format_large_number, write_ranked_json};
use globalcap_core::sink::parse_snapshot_date;
use globalcap_core::{
    load_symbol_file, ConfigError, FallbackRates, Pipeline, PipelineConfig, PipelineOutcome,
    SnapshotSink, UniverseStrategy,
};
use time::{Date, OffsetDateTime};
use tracing::info;

use crate::cli::{RunArgs, UniverseKind};
use crate::error::CliError;

use super::{fit, open_warehouse};

const SUMMARY_ROWS: usize = 10;

pub async fn run(args: &RunArgs, warehouse_path: Option<&Path>) -> Result<(), CliError> {
    let config = build_config(args)?;
    let snapshot_date = resolve_snapshot_date(args.snapshot_date.as_deref())?;
    // open before collecting so a bad path fails fast
    let warehouse = if args.no_persist {
        None
    } else {
        Some(open_warehouse(warehouse_path)?)
    };

    let outcome = Pipeline::with_fmp(config)?.run().await?;

    write_ranked_json(&args.output, &outcome.ranked)?;
    info!(path = %args.output.display(), assets = outcome.ranked.len(), "artifact written");

    if let Some(path) = &args.report {
        let mut rendered = serde_json::to_string_pretty(&outcome.report)?;
        rendered.push('\n');
        std::fs::write(path, rendered)?;
    }

    if let Some(warehouse) = warehouse {
        warehouse.persist(&outcome.report.run_id, snapshot_date, &outcome.ranked, args.clear)?;
    }

    print!("{}", render_summary(&outcome));
    Ok(())
}

fn build_config(args: &RunArgs) -> Result<PipelineConfig, ConfigError> {
    let api_key = args
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or(ConfigError::MissingApiKey)?;

    let mut config = PipelineConfig::new(api_key);
    config.universe = match args.universe {
        UniverseKind::Curated => UniverseStrategy::Curated {
            symbols: match &args.symbols_file {
                Some(path) => load_symbol_file(path)?,
                None => default_curated_symbols(),
            },
        },
        UniverseKind::Screener => UniverseStrategy::Screener {
            countries: if args.countries.is_empty() {
                DEFAULT_SCREENER_COUNTRIES
                    .iter()
                    .map(|country| (*country).to_owned())
                    .collect()
            } else {
                args.countries.clone()
            },
            min_market_cap: args.min_market_cap,
            limit: args.screener_limit,
        },
    };

    config.top_n = args.top_n;
    config.batch_size = args.batch_size;
    config.max_concurrency = args.max_concurrency;
    config.batch_delay_ms = args.batch_delay_ms;
    config.request_timeout_ms = args.timeout_ms;
    config.requests_per_minute = args.requests_per_minute;
    config.max_retries = args.max_retries;
    config.fetch_profiles = !args.skip_profiles;
    config.crypto_input = args.crypto_input.clone();

    if let Some(path) = &args.fx_fallback {
        config.fx_fallback = FallbackRates::from_json_file(path)?;
    }
    if let Some(ratio) = args.override_ratio {
        config.reconciliation.override_ratio = ratio;
    }
    if let Some(cap) = args.implausible_cap_usd {
        config.reconciliation.implausible_cap_usd = cap;
    }

    config.validate()?;
    Ok(config)
}

fn resolve_snapshot_date(value: Option<&str>) -> Result<Date, ConfigError> {
    match value {
        Some(value) => parse_snapshot_date(value)
            .map_err(|error| ConfigError::invalid("snapshot_date", error.to_string())),
        None => Ok(OffsetDateTime::now_utc().date()),
    }
}

fn render_summary(outcome: &PipelineOutcome) -> String {
    let mut lines = vec![format!(
        "{:>4}  {:<12} {:<28} {:>10}  {:<9} {}",
        "RANK", "TICKER", "NAME", "MCAP (USD)", "TYPE", "COUNTRY"
    )];
    for ranked in outcome.ranked.iter().take(SUMMARY_ROWS) {
        let asset = &ranked.asset;
        lines.push(format!(
            "{:>4}  {:<12} {:<28} {:>10}  {:<9} {}",
            ranked.rank,
            asset.ticker().as_str(),
            fit(asset.name(), 28),
            format_large_number(asset.market_cap_usd()),
            asset.asset_type().as_str(),
            asset.country()
        ));
    }

    let report = &outcome.report;
    lines.push(String::new());
    for source in &report.sources {
        lines.push(format!(
            "{:<12} processed={} skipped={} failed_batches={}",
            source.source,
            source.processed,
            source.skipped_total(),
            source.batches_failed
        ));
    }
    lines.push(format!(
        "ranked={} deduplicated={} overrides={} fx_table={}",
        report.final_count,
        report.deduplicated_listings,
        report.reconciliation_overrides.len(),
        report.fx_fallback_version
    ));

    let mut rendered = lines.join("\n");
    rendered.push('\n');
    rendered
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::{Cli, Command};

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["globalcap", "run"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).expect("parse").command {
            Command::Run(args) => args,
            Command::Show(_) => panic!("expected run"),
        }
    }

    #[test]
    fn blank_api_key_is_a_config_error() {
        let args = run_args(&["--api-key", "  "]);

        assert!(matches!(build_config(&args), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn screener_without_countries_uses_defaults() {
        let args = run_args(&["--api-key", "k", "--universe", "screener"]);
        let config = build_config(&args).expect("valid");

        match config.universe {
            UniverseStrategy::Screener { countries, .. } => {
                assert_eq!(countries.len(), DEFAULT_SCREENER_COUNTRIES.len());
            }
            UniverseStrategy::Curated { .. } => panic!("expected screener"),
        }
    }

    #[test]
    fn tuning_flags_reach_the_config() {
        let args = run_args(&[
            "--api-key",
            "k",
            "--top-n",
            "100",
            "--skip-profiles",
            "--implausible-cap-usd",
            "5e12",
        ]);
        let config = build_config(&args).expect("valid");

        assert_eq!(config.top_n, 100);
        assert!(!config.fetch_profiles);
        assert_eq!(config.reconciliation.implausible_cap_usd, 5e12);
    }

    #[test]
    fn symbol_file_replaces_the_builtin_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("symbols.txt");
        std::fs::write(&path, "AAPL\n0700.HK\n").expect("write");
        let path = path.to_string_lossy().into_owned();

        let config =
            build_config(&run_args(&["--api-key", "k", "--symbols-file", &path])).expect("valid");

        match config.universe {
            UniverseStrategy::Curated { symbols } => assert_eq!(symbols.len(), 2),
            UniverseStrategy::Screener { .. } => panic!("expected curated"),
        }
    }

    #[test]
    fn malformed_snapshot_date_is_rejected() {
        assert!(resolve_snapshot_date(Some("2024-13-40")).is_err());
        assert!(resolve_snapshot_date(Some("2024-06-01")).is_ok());
    }
}
