//! # Globalcap Core
//!
//! Collection, currency normalization, deduplication and ranking of the
//! world's largest listed assets.
//!
//! ## Overview
//!
//! One run of the [`Pipeline`]:
//!
//! - fetches equity candidates from Financial Modeling Prep in batches,
//!   evaluating each symbol under a bounded semaphore
//! - converts native market caps to USD with live FX rates, falling back to
//!   a versioned table
//! - builds synthetic market caps for precious and industrial metals
//! - optionally merges a crypto snapshot written by an external producer
//! - collapses cross-listings of the same company to its best listing
//! - ranks everything by USD market cap and keeps the top N
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | FMP REST adapter |
//! | [`commodity`] | Essential-commodity filter and synthetic caps |
//! | [`config`] | Validated run configuration |
//! | [`crypto`] | Crypto snapshot reader |
//! | [`currency`] | Listing venues, currency resolution, FX cache |
//! | [`data_source`] | Upstream trait and payload types |
//! | [`dedup`] | Listing priority and cross-listing collapse |
//! | [`domain`] | `Symbol`, `AssetRecord`, `RankedAsset` |
//! | [`equities`] | Concurrent equity fetcher |
//! | [`output`] | Ranked JSON artifact |
//! | [`pipeline`] | End-to-end run |
//! | [`ranking`] | Global ordering and top-N selection |
//! | [`reconcile`] | Batch vs quote market-cap reconciliation |
//! | [`report`] | Per-run audit counters |
//! | [`sink`] | Snapshot persistence boundary |
//! | [`universe`] | Curated and screener symbol universes |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use globalcap_core::{Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::new(std::env::var("FMP_API_KEY")?);
//!     let outcome = Pipeline::with_fmp(config)?.run().await?;
//!
//!     for ranked in outcome.ranked.iter().take(10) {
//!         println!("{:>3} {} {}", ranked.rank, ranked.asset.ticker(), ranked.asset.market_cap_usd());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Security
//!
//! The API key travels as the `apikey` query parameter. It is masked in
//! every logged URL and never appears in error messages.

pub mod adapters;
pub mod commodity;
pub mod config;
pub mod crypto;
pub mod currency;
pub mod data_source;
pub mod dedup;
pub mod domain;
pub mod equities;
pub mod error;
pub mod filters;
pub mod http_client;
pub mod output;
pub mod pipeline;
pub mod provider_policy;
pub mod ranking;
pub mod reconcile;
pub mod report;
pub mod retry;
pub mod sink;
pub mod throttling;
pub mod universe;

#[cfg(test)]
mod test_support;

pub use adapters::FmpAdapter;

pub use config::{load_symbol_file, PipelineConfig, UniverseStrategy};

pub use currency::{resolve_currency, CurrencyResolver, ExchangeRateCache, FallbackRates, RateSource};

pub use data_source::{MarketDataProvider, SourceError, SourceErrorKind};

pub use dedup::{deduplicate, listing_priority};

pub use domain::{validate_currency_code, AssetDraft, AssetRecord, AssetType, RankedAsset, Symbol};

pub use error::{ConfigError, OutputError, PipelineError, ValidationError};

pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

pub use pipeline::{Pipeline, PipelineOutcome};

pub use provider_policy::ProviderPolicy;

pub use ranking::{rank_assets, DEFAULT_TOP_N};

pub use report::{RunReport, SkipReason, SourceReport};

pub use retry::{Backoff, RetryConfig};

pub use sink::{SinkError, SnapshotSink};

// Warehouse types surface through the sink
pub use globalcap_warehouse::{UpsertReport, Warehouse, WarehouseConfig, WarehouseError};
