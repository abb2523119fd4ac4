//! Global equity fetcher.
//!
//! Walks the universe batch by batch. Inside a batch every candidate is
//! evaluated by its own task, bounded by a semaphore; outcomes come back
//! through a `JoinSet` to a single collector.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::currency::{resolve_currency, venue_of, CurrencyResolver};
use crate::data_source::{CompanyProfile, EquityQuote, MarketDataProvider, ScreenerRow};
use crate::filters::{classify_asset_type, is_fund_name};
use crate::reconcile::{reconcile, sanity_check, ReconcileMethod, ReconciliationPolicy};
use crate::report::{ReconciliationOverride, SkipReason, SourceReport};
use crate::universe::{Candidate, SymbolUniverse};
use crate::{AssetDraft, AssetRecord, Symbol};

#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    pub max_concurrency: usize,
    pub batch_delay: Duration,
    pub fetch_profiles: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            batch_delay: Duration::from_millis(50),
            fetch_profiles: true,
        }
    }
}

/// Everything the equity stage produced.
#[derive(Debug, Clone)]
pub struct EquityHarvest {
    /// Sorted by ticker.
    pub records: Vec<AssetRecord>,
    pub report: SourceReport,
    /// Sorted by symbol.
    pub overrides: Vec<ReconciliationOverride>,
}

pub struct EquityFetcher {
    provider: Arc<dyn MarketDataProvider>,
    universe: Arc<dyn SymbolUniverse>,
    context: Arc<WorkerContext>,
    settings: FetchSettings,
}

impl EquityFetcher {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        universe: Arc<dyn SymbolUniverse>,
        resolver: CurrencyResolver,
        policy: ReconciliationPolicy,
        settings: FetchSettings,
    ) -> Self {
        let context = Arc::new(WorkerContext {
            provider: Arc::clone(&provider),
            resolver,
            policy,
            fetch_profiles: settings.fetch_profiles,
        });
        Self {
            provider,
            universe,
            context,
            settings,
        }
    }

    pub async fn collect(&self) -> EquityHarvest {
        let mut report = SourceReport::new("equities");
        let mut records = Vec::new();
        let mut overrides = Vec::new();

        let batches = self.universe.batches();
        let total = batches.len();
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        info!(universe = self.universe.name(), batches = total, "collecting equities");

        for (index, batch) in batches.iter().enumerate() {
            report.batches_requested += 1;
            let label = batch.label();

            match self.universe.resolve(self.provider.as_ref(), batch).await {
                Ok(resolution) => {
                    report.requested += resolution.requested;
                    report.received += resolution.candidates.len() + resolution.discarded.len();
                    for (symbol, reason) in resolution.discarded {
                        debug!(symbol = %symbol, reason = %reason, "screener row discarded");
                        report.skip(reason);
                    }

                    let mut workers = JoinSet::new();
                    for candidate in resolution.candidates {
                        let market_cap = candidate.batch_market_cap;
                        if !market_cap.is_finite() || market_cap <= 0.0 {
                            debug!(symbol = %candidate.symbol, market_cap, "no positive market cap");
                            report.skip(SkipReason::NonPositiveMarketCap);
                            continue;
                        }

                        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                            report.skip(SkipReason::WorkerFailed);
                            continue;
                        };
                        let context = Arc::clone(&self.context);
                        workers.spawn(async move {
                            let _permit = permit;
                            context.evaluate(candidate).await
                        });
                    }

                    while let Some(joined) = workers.join_next().await {
                        match joined {
                            Ok(Outcome::Accepted {
                                record,
                                reconciliation,
                            }) => {
                                overrides.extend(reconciliation);
                                records.push(record);
                            }
                            Ok(Outcome::Skipped { symbol, reason }) => {
                                debug!(symbol = %symbol, reason = %reason, "equity skipped");
                                report.skip(reason);
                            }
                            Err(error) => {
                                warn!(error = %error, "equity worker failed");
                                report.skip(SkipReason::WorkerFailed);
                            }
                        }
                    }
                    debug!(batch = %label, collected = records.len(), "batch done");
                }
                Err(error) => {
                    // symbols of a lost batch count as requested and skipped
                    let lost = batch.symbol_count();
                    warn!(
                        batch = %label,
                        symbols = lost,
                        error = %error,
                        "batch failed, skipping"
                    );
                    report.batches_failed += 1;
                    report.requested += lost;
                    report.skip_many(SkipReason::BatchFailed, lost.max(1));
                }
            }

            if index + 1 < total && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
        }

        records.sort_by(|left, right| left.ticker().cmp(right.ticker()));
        overrides.sort_by(|left, right| left.symbol.cmp(&right.symbol));
        report.processed = records.len();

        EquityHarvest {
            records,
            report,
            overrides,
        }
    }
}

enum Outcome {
    Accepted {
        record: AssetRecord,
        reconciliation: Option<ReconciliationOverride>,
    },
    Skipped {
        symbol: String,
        reason: SkipReason,
    },
}

impl Outcome {
    fn skipped(symbol: &Symbol, reason: SkipReason) -> Self {
        Self::Skipped {
            symbol: symbol.to_string(),
            reason,
        }
    }
}

struct WorkerContext {
    provider: Arc<dyn MarketDataProvider>,
    resolver: CurrencyResolver,
    policy: ReconciliationPolicy,
    fetch_profiles: bool,
}

impl WorkerContext {
    async fn evaluate(&self, candidate: Candidate) -> Outcome {
        let symbol = candidate.symbol;

        let quote = match self.provider.quote(&symbol).await {
            Ok(quote) => quote,
            Err(error) => {
                debug!(symbol = %symbol, error = %error, "quote failed");
                return Outcome::skipped(&symbol, SkipReason::QuoteFailed);
            }
        };

        let profile = if self.fetch_profiles {
            match self.provider.profile(&symbol).await {
                Ok(profile) => Some(profile),
                Err(error) => {
                    debug!(symbol = %symbol, error = %error, "profile failed, using quote data");
                    None
                }
            }
        } else {
            None
        };
        let screener = candidate.screener.as_ref();

        let name = first_present([
            profile.as_ref().and_then(|p| p.company_name.as_deref()),
            screener.and_then(|s| s.company_name.as_deref()),
            quote.name.as_deref(),
        ])
        .unwrap_or_else(|| symbol.to_string());

        if is_fund_name(&name) || profile.as_ref().is_some_and(|p| p.is_etf || p.is_fund) {
            return Outcome::skipped(&symbol, SkipReason::FundExcluded);
        }
        if profile.as_ref().is_some_and(|p| !p.is_actively_trading) {
            return Outcome::skipped(&symbol, SkipReason::InactiveOrEtf);
        }

        let venue = venue_of(&symbol);
        let country = first_present([
            profile.as_ref().and_then(|p| p.country.as_deref()),
            screener.and_then(|s| s.country.as_deref()),
            venue.map(|v| v.country),
        ])
        .unwrap_or_else(|| String::from("US"));

        let currency = resolve_currency(symbol.as_str(), &country);
        let rate = self.resolver.usd_rate(currency).await;
        let reconciled = reconcile(
            &self.policy,
            currency,
            candidate.batch_market_cap,
            quote.market_cap,
            rate.rate,
        );

        let reconciliation = (reconciled.method == ReconcileMethod::QuoteAssumedUsd).then(|| {
            let quote_market_cap = quote.market_cap.unwrap_or(reconciled.market_cap_usd);
            warn!(
                symbol = %symbol,
                currency,
                batch_market_cap = candidate.batch_market_cap,
                quote_market_cap,
                "quote market cap assumed to be USD"
            );
            ReconciliationOverride {
                symbol: symbol.to_string(),
                currency: currency.to_owned(),
                batch_market_cap: candidate.batch_market_cap,
                quote_market_cap,
                method: reconciled.method,
            }
        });

        if let Err(reason) = sanity_check(&self.policy, symbol.as_str(), reconciled.market_cap_usd) {
            warn!(
                symbol = %symbol,
                market_cap_usd = reconciled.market_cap_usd,
                reason = %reason,
                "dropping anomalous market cap"
            );
            return Outcome::skipped(&symbol, reason);
        }

        let draft = build_draft(
            &symbol,
            name,
            country,
            currency,
            reconciled.market_cap_usd,
            &quote,
            profile.as_ref(),
            screener,
        );

        match AssetRecord::new(draft) {
            Ok(record) => Outcome::Accepted {
                record,
                reconciliation,
            },
            Err(error) => {
                debug!(symbol = %symbol, error = %error, "invalid equity record");
                Outcome::skipped(&symbol, SkipReason::InvalidRecord)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_draft(
    symbol: &Symbol,
    name: String,
    country: String,
    currency: &str,
    market_cap_usd: f64,
    quote: &EquityQuote,
    profile: Option<&CompanyProfile>,
    screener: Option<&ScreenerRow>,
) -> AssetDraft {
    let price = quote
        .price
        .or_else(|| screener.and_then(|s| s.price))
        .unwrap_or(0.0);
    let previous_close = quote.previous_close.unwrap_or(price);
    let percentage_change = quote.change_percent.unwrap_or_else(|| {
        if previous_close > 0.0 {
            (price - previous_close) / previous_close * 100.0
        } else {
            0.0
        }
    });

    let industry = first_present([
        profile.and_then(|p| p.industry.as_deref()),
        screener.and_then(|s| s.industry.as_deref()),
    ])
    .unwrap_or_default();
    let sector = first_present([
        profile.and_then(|p| p.sector.as_deref()),
        screener.and_then(|s| s.sector.as_deref()),
    ])
    .unwrap_or_default();
    let primary_exchange = first_present([
        profile.and_then(|p| p.exchange.as_deref()),
        quote.exchange.as_deref(),
        screener.and_then(|s| s.exchange.as_deref()),
    ])
    .unwrap_or_default();

    AssetDraft {
        ticker: symbol.to_string(),
        asset_type: classify_asset_type(&name, &industry),
        name,
        market_cap_usd,
        current_price: price,
        previous_close,
        percentage_change,
        volume: quote
            .volume
            .or_else(|| screener.and_then(|s| s.volume))
            .unwrap_or(0.0),
        primary_exchange,
        country,
        sector,
        industry,
        image: profile.and_then(|p| p.image.clone()),
        currency: currency.to_owned(),
    }
}

/// First value that is present and not blank.
fn first_present<const N: usize>(values: [Option<&str>; N]) -> Option<String> {
    values
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::currency::FallbackRates;
    use crate::test_support::FixtureProvider;
    use crate::universe::{CuratedUniverse, ScreenerUniverse};
    use crate::AssetType;

    fn quote(symbol: &str, price: f64, market_cap: f64) -> EquityQuote {
        EquityQuote {
            symbol: symbol.to_owned(),
            name: Some(format!("{symbol} Quote Name")),
            price: Some(price),
            previous_close: Some(price * 0.99),
            change_percent: Some(1.01),
            volume: Some(1_000.0),
            market_cap: Some(market_cap),
            exchange: Some(String::from("NASDAQ")),
        }
    }

    fn profile(symbol: &str, name: &str, country: &str) -> CompanyProfile {
        CompanyProfile {
            symbol: symbol.to_owned(),
            company_name: Some(name.to_owned()),
            country: Some(country.to_owned()),
            sector: Some(String::from("Technology")),
            industry: Some(String::from("Software")),
            exchange: Some(String::from("NASDAQ")),
            is_actively_trading: true,
            ..CompanyProfile::default()
        }
    }

    fn fetcher(provider: FixtureProvider, symbols: &[&str]) -> EquityFetcher {
        let provider: Arc<dyn MarketDataProvider> = Arc::new(provider);
        let symbols = symbols
            .iter()
            .map(|value| Symbol::parse(value).expect("valid symbol"))
            .collect();
        EquityFetcher::new(
            Arc::clone(&provider),
            Arc::new(CuratedUniverse::new(symbols, 2)),
            CurrencyResolver::new(provider, FallbackRates::builtin()),
            ReconciliationPolicy::default(),
            FetchSettings {
                max_concurrency: 2,
                batch_delay: Duration::ZERO,
                fetch_profiles: true,
            },
        )
    }

    #[tokio::test]
    async fn converts_non_usd_caps_and_keeps_native_prices() {
        let provider = FixtureProvider {
            market_caps: HashMap::from([(String::from("BETA.HK"), 300e9)]),
            quotes: HashMap::from([(String::from("BETA.HK"), quote("BETA.HK", 80.0, 310e9))]),
            profiles: HashMap::from([(
                String::from("BETA.HK"),
                profile("BETA.HK", "Beta Holdings", "HK"),
            )]),
            ..FixtureProvider::default()
        }
        .with_fx_midpoint("HKD", 0.128);

        let harvest = fetcher(provider, &["BETA.HK"]).collect().await;

        assert_eq!(harvest.records.len(), 1);
        let beta = &harvest.records[0];
        assert!((beta.market_cap_usd() - 38.4e9).abs() < 1.0);
        assert_eq!(beta.current_price(), 80.0);
        assert_eq!(beta.currency(), "HKD");
        assert!(harvest.overrides.is_empty());
    }

    #[tokio::test]
    async fn quote_failure_skips_symbol_and_missing_profile_is_synthesized() {
        let provider = FixtureProvider {
            market_caps: HashMap::from([
                (String::from("ACME"), 50e9),
                (String::from("GONE"), 10e9),
            ]),
            quotes: HashMap::from([(String::from("ACME"), quote("ACME", 100.0, 50e9))]),
            ..FixtureProvider::default()
        };

        let harvest = fetcher(provider, &["ACME", "GONE"]).collect().await;

        assert_eq!(harvest.records.len(), 1);
        let acme = &harvest.records[0];
        assert_eq!(acme.name(), "ACME Quote Name");
        assert_eq!(acme.country(), "US");
        assert_eq!(acme.primary_exchange(), "NASDAQ");
        assert_eq!(harvest.report.skipped_for(SkipReason::QuoteFailed), 1);
    }

    #[tokio::test]
    async fn funds_anomalies_and_non_positive_caps_are_dropped() {
        let provider = FixtureProvider {
            market_caps: HashMap::from([
                (String::from("SPY"), 500e9),
                (String::from("HUGE"), 15e12),
                (String::from("ZERO"), 0.0),
                (String::from("HOME"), 20e9),
            ]),
            quotes: HashMap::from([
                (String::from("SPY"), quote("SPY", 500.0, 500e9)),
                (String::from("HUGE"), quote("HUGE", 1.0, 15e12)),
                (String::from("HOME"), quote("HOME", 50.0, 20e9)),
            ]),
            profiles: HashMap::from([
                (String::from("SPY"), profile("SPY", "SPDR S&P 500 ETF Trust", "US")),
                (String::from("HOME"), {
                    let mut home = profile("HOME", "Home Realty REIT", "US");
                    home.industry = Some(String::from("REIT—Residential"));
                    home
                }),
            ]),
            ..FixtureProvider::default()
        };

        let harvest = fetcher(provider, &["SPY", "HUGE", "ZERO", "HOME"]).collect().await;

        assert_eq!(harvest.records.len(), 1);
        assert_eq!(harvest.records[0].asset_type(), AssetType::Reit);
        assert_eq!(harvest.report.skipped_for(SkipReason::FundExcluded), 1);
        assert_eq!(harvest.report.skipped_for(SkipReason::ImplausibleMarketCap), 1);
        assert_eq!(harvest.report.skipped_for(SkipReason::NonPositiveMarketCap), 1);
        assert_eq!(harvest.report.batches_requested, 2);
    }

    #[tokio::test]
    async fn quote_figure_override_is_reported() {
        let provider = FixtureProvider {
            market_caps: HashMap::from([(String::from("005930.KS"), 40e9)]),
            quotes: HashMap::from([(String::from("005930.KS"), quote("005930.KS", 70_000.0, 450e9))]),
            profiles: HashMap::from([(
                String::from("005930.KS"),
                profile("005930.KS", "Samsung Electronics", "KR"),
            )]),
            ..FixtureProvider::default()
        };

        let harvest = fetcher(provider, &["005930.KS"]).collect().await;

        assert_eq!(harvest.records[0].market_cap_usd(), 450e9);
        assert_eq!(harvest.overrides.len(), 1);
        assert_eq!(harvest.overrides[0].method, ReconcileMethod::QuoteAssumedUsd);
    }

    #[tokio::test]
    async fn failed_batch_is_counted_and_skipped() {
        let provider: Arc<dyn MarketDataProvider> = Arc::new(FixtureProvider {
            screener: HashMap::from([(
                String::from("US"),
                vec![ScreenerRow {
                    symbol: String::from("ACME"),
                    company_name: Some(String::from("Acme Corp")),
                    market_cap: Some(50e9),
                    country: Some(String::from("US")),
                    is_actively_trading: true,
                    ..ScreenerRow::default()
                }],
            )]),
            quotes: HashMap::from([(String::from("ACME"), quote("ACME", 100.0, 50e9))]),
            ..FixtureProvider::default()
        });
        let fetcher = EquityFetcher::new(
            Arc::clone(&provider),
            Arc::new(ScreenerUniverse::new(
                vec![String::from("US"), String::from("JP")],
                1e9,
                100,
            )),
            CurrencyResolver::new(provider, FallbackRates::builtin()),
            ReconciliationPolicy::default(),
            FetchSettings {
                batch_delay: Duration::ZERO,
                ..FetchSettings::default()
            },
        );

        let harvest = fetcher.collect().await;

        assert_eq!(harvest.records.len(), 1);
        assert_eq!(harvest.records[0].name(), "Acme Corp");
        assert_eq!(harvest.report.batches_requested, 2);
        assert_eq!(harvest.report.batches_failed, 1);
        assert_eq!(harvest.report.skipped_for(SkipReason::BatchFailed), 1);
    }

    #[tokio::test]
    async fn lost_market_cap_batches_count_every_symbol() {
        let provider = FixtureProvider {
            market_caps_down: true,
            ..FixtureProvider::default()
        };

        let harvest = fetcher(provider, &["AAPL", "MSFT", "NVDA"]).collect().await;

        assert!(harvest.records.is_empty());
        assert_eq!(harvest.report.batches_requested, 2);
        assert_eq!(harvest.report.batches_failed, 2);
        assert_eq!(harvest.report.requested, 3);
        assert_eq!(harvest.report.skipped_for(SkipReason::BatchFailed), 3);
    }
}
