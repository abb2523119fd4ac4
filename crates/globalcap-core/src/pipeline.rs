//! End-to-end collection run.
//!
//! ```text
//! equities ──> dedup ──┐
//! commodities ─────────┼──> rank ──> RunReport
//! crypto file ─────────┘
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use crate::adapters::FmpAdapter;
use crate::commodity::CommodityNormalizer;
use crate::config::PipelineConfig;
use crate::crypto::CryptoSnapshotReader;
use crate::currency::CurrencyResolver;
use crate::data_source::MarketDataProvider;
use crate::dedup::deduplicate;
use crate::equities::EquityFetcher;
use crate::error::PipelineError;
use crate::ranking::rank_assets;
use crate::report::{FxRateUsed, RunReport};
use crate::RankedAsset;

/// Ranked list plus its audit trail.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub ranked: Vec<RankedAsset>,
    pub report: RunReport,
}

pub struct Pipeline {
    config: PipelineConfig,
    provider: Arc<dyn MarketDataProvider>,
}

impl Pipeline {
    /// Validates `config` before anything touches the network.
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn MarketDataProvider>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config, provider })
    }

    /// Pipeline backed by the live FMP API.
    pub fn with_fmp(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let adapter = FmpAdapter::new(config.api_key.clone(), config.provider_policy());
        Ok(Self {
            config,
            provider: Arc::new(adapter),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Collect every source, deduplicate equities and rank the union.
    ///
    /// A failing source contributes nothing; only an entirely empty run is
    /// an error.
    pub async fn run(&self) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        info!(
            run_id = %run_id,
            universe = self.config.universe.name(),
            top_n = self.config.top_n,
            "pipeline started"
        );

        let resolver = CurrencyResolver::new(
            Arc::clone(&self.provider),
            self.config.fx_fallback.clone(),
        );
        let equities = EquityFetcher::new(
            Arc::clone(&self.provider),
            self.config.universe.build(self.config.batch_size),
            resolver.clone(),
            self.config.reconciliation.clone(),
            self.config.fetch_settings(),
        );
        let commodities = CommodityNormalizer::new(Arc::clone(&self.provider));
        let crypto = self.config.crypto_input.as_ref().map(CryptoSnapshotReader::new);

        let (harvest, (commodity_records, commodity_report), crypto_source) = tokio::join!(
            equities.collect(),
            commodities.collect(),
            async {
                match &crypto {
                    Some(reader) => Some(reader.collect().await),
                    None => None,
                }
            }
        );

        let deduplicated = deduplicate(harvest.records);
        if deduplicated.collapsed > 0 {
            info!(collapsed = deduplicated.collapsed, "cross-listings collapsed");
        }

        let mut sources = vec![harvest.report, commodity_report];
        let mut crypto_records = Vec::new();
        if let Some((records, report)) = crypto_source {
            crypto_records = records;
            sources.push(report);
        }

        if deduplicated.records.is_empty() && commodity_records.is_empty() && crypto_records.is_empty()
        {
            warn!(run_id = %run_id, "every source came back empty");
            return Err(PipelineError::NoData);
        }

        let ranked = rank_assets(
            deduplicated
                .records
                .into_iter()
                .chain(commodity_records)
                .chain(crypto_records),
            self.config.top_n,
        );

        let fx_rates = resolver
            .cache()
            .snapshot()
            .await
            .into_iter()
            .map(|(currency, rate)| FxRateUsed::from_cache(currency, rate))
            .collect();

        let report = RunReport {
            run_id,
            sources,
            reconciliation_overrides: harvest.overrides,
            fx_rates,
            fx_fallback_version: resolver.fallback_version().to_owned(),
            deduplicated_listings: deduplicated.collapsed,
            final_count: ranked.len(),
        };
        report.log_summary();
        info!(
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "pipeline finished"
        );

        Ok(PipelineOutcome { ranked, report })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::UniverseStrategy;
    use crate::data_source::{CommodityQuote, EquityQuote};
    use crate::test_support::FixtureProvider;
    use crate::{AssetType, Symbol};

    fn config(symbols: &[&str]) -> PipelineConfig {
        let mut config = PipelineConfig::new("test-key");
        config.universe = UniverseStrategy::Curated {
            symbols: symbols
                .iter()
                .map(|value| Symbol::parse(value).expect("valid symbol"))
                .collect(),
        };
        config.batch_delay_ms = 0;
        config.fetch_profiles = false;
        config
    }

    fn quote(symbol: &str, name: &str, price: f64) -> EquityQuote {
        EquityQuote {
            symbol: symbol.to_owned(),
            name: Some(name.to_owned()),
            price: Some(price),
            previous_close: Some(price),
            ..EquityQuote::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let result = Pipeline::new(
            PipelineConfig::new(""),
            Arc::new(FixtureProvider::default()),
        );

        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn empty_sources_are_no_data() {
        let pipeline = Pipeline::new(config(&["ACME"]), Arc::new(FixtureProvider::default()))
            .expect("valid config");

        assert!(matches!(pipeline.run().await, Err(PipelineError::NoData)));
    }

    #[tokio::test]
    async fn commodities_rank_alongside_equities() {
        let provider = FixtureProvider {
            market_caps: HashMap::from([(String::from("ACME"), 50e9)]),
            quotes: HashMap::from([(String::from("ACME"), quote("ACME", "Acme Corp", 120.0))]),
            commodities: Some(vec![CommodityQuote {
                symbol: String::from("GCUSD"),
                name: String::from("Gold Futures"),
                price: Some(2_400.0),
                ..CommodityQuote::default()
            }]),
            ..FixtureProvider::default()
        };
        let pipeline = Pipeline::new(config(&["ACME"]), Arc::new(provider)).expect("valid config");

        let outcome = pipeline.run().await.expect("run succeeds");

        let order: Vec<(u32, &str)> = outcome
            .ranked
            .iter()
            .map(|ranked| (ranked.rank, ranked.asset.ticker().as_str()))
            .collect();
        assert_eq!(order, vec![(1, "GCUSD"), (2, "ACME")]);
        assert_eq!(outcome.ranked[0].asset.asset_type(), AssetType::Commodity);
        assert_eq!(outcome.report.final_count, 2);
        assert!(outcome.report.source("equities").is_some());
        assert!(outcome.report.source("crypto").is_none());
    }
}
