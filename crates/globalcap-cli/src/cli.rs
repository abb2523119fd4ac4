//! CLI argument definitions for globalcap.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Collect, rank, write the JSON artifact and persist the snapshot |
//! | `show` | Print a stored snapshot or the upload history |
//!
//! # Global Options
//!
//! | Option | Env | Description |
//! |--------|-----|-------------|
//! | `--warehouse` | `GLOBALCAP_WAREHOUSE` | DuckDB snapshot file |
//! | `--log-json` | | JSON log lines instead of compact text |
//!
//! # Examples
//!
//! ```bash
//! # Daily run with the built-in curated list
//! FMP_API_KEY=... globalcap run
//!
//! # Screener universe, replace today's rows entirely
//! globalcap run --universe screener --countries US,JP,HK --clear
//!
//! # Inspect what was stored
//! globalcap show --date 2024-06-01 --limit 25
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Global asset ranking by USD market capitalization.
#[derive(Debug, Parser)]
#[command(
    name = "globalcap",
    author,
    version,
    about = "Global asset ranking by USD market capitalization",
    long_about = "globalcap collects listed equities and essential commodities from Financial \
Modeling Prep, converts market caps to USD, collapses cross-listings, ranks the top assets \
and stores a dated snapshot in a local DuckDB warehouse.\n\
\n\
Use 'globalcap <command> --help' for command-specific help."
)]
pub struct Cli {
    /// DuckDB snapshot warehouse. Defaults to $GLOBALCAP_HOME/snapshots.duckdb.
    #[arg(long, global = true, env = "GLOBALCAP_WAREHOUSE")]
    pub warehouse: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the collection pipeline once.
    Run(RunArgs),

    /// Print a stored snapshot.
    Show(ShowArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum UniverseKind {
    /// Built-in or file-provided symbol list, resolved through the batch endpoint.
    Curated,
    /// Per-country stock screener.
    Screener,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Financial Modeling Prep API key.
    #[arg(long, env = "FMP_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, value_enum, default_value_t = UniverseKind::Curated)]
    pub universe: UniverseKind,

    /// Newline-separated symbols for the curated universe.
    #[arg(long)]
    pub symbols_file: Option<PathBuf>,

    /// Screener countries, comma separated (ISO alpha-2).
    #[arg(long, value_delimiter = ',')]
    pub countries: Vec<String>,

    /// Screener lower bound on market cap.
    #[arg(long, default_value_t = 1e9)]
    pub min_market_cap: f64,

    /// Screener rows per country.
    #[arg(long, default_value_t = 1_000)]
    pub screener_limit: usize,

    #[arg(long, default_value_t = 500)]
    pub top_n: usize,

    /// Symbols per batch market-cap request.
    #[arg(long, default_value_t = 75)]
    pub batch_size: usize,

    /// Symbols evaluated concurrently.
    #[arg(long, default_value_t = 10)]
    pub max_concurrency: usize,

    /// Pause between batches.
    #[arg(long, default_value_t = 50)]
    pub batch_delay_ms: u64,

    /// Per-request timeout.
    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: u64,

    #[arg(long, default_value_t = 3_000)]
    pub requests_per_minute: u32,

    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,

    /// Skip company profiles (one request less per symbol, generic metadata).
    #[arg(long, default_value_t = false)]
    pub skip_profiles: bool,

    /// JSON fallback FX table replacing the built-in one.
    #[arg(long)]
    pub fx_fallback: Option<PathBuf>,

    /// Crypto snapshot to merge into the ranking.
    #[arg(long, env = "GLOBALCAP_CRYPTO_INPUT")]
    pub crypto_input: Option<PathBuf>,

    /// Quote cap must exceed this multiple of the batch cap to be taken as USD.
    #[arg(long)]
    pub override_ratio: Option<f64>,

    /// Market caps above this USD figure are dropped.
    #[arg(long)]
    pub implausible_cap_usd: Option<f64>,

    /// Ranked JSON artifact.
    #[arg(long, default_value = "global_assets.json")]
    pub output: PathBuf,

    /// Also write the run report as JSON.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Snapshot date (YYYY-MM-DD). Defaults to today in UTC.
    #[arg(long)]
    pub snapshot_date: Option<String>,

    /// Delete existing rows of the snapshot date before uploading.
    #[arg(long, default_value_t = false)]
    pub clear: bool,

    /// Write the artifact only, skip the warehouse.
    #[arg(long, default_value_t = false)]
    pub no_persist: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Snapshot date (YYYY-MM-DD). Defaults to the most recent one.
    #[arg(long)]
    pub date: Option<String>,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// List uploads instead of assets.
    #[arg(long, default_value_t = false)]
    pub runs: bool,

    /// Print JSON instead of a table.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
