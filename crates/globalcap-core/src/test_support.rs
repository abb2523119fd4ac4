use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::data_source::{
    CommodityQuote, CompanyProfile, EquityQuote, FxQuote, MarketCapEntry, MarketDataProvider,
    ScreenerQuery, ScreenerRow, SourceError, SourceFuture,
};
use crate::{AssetDraft, AssetRecord, AssetType, Symbol};

/// In-memory provider. Anything not configured fails like a 404.
#[derive(Default)]
pub(crate) struct FixtureProvider {
    pub market_caps: HashMap<String, f64>,
    pub quotes: HashMap<String, EquityQuote>,
    pub profiles: HashMap<String, CompanyProfile>,
    pub commodities: Option<Vec<CommodityQuote>>,
    pub fx: HashMap<String, FxQuote>,
    pub screener: HashMap<String, Vec<ScreenerRow>>,
    pub market_caps_down: bool,
    pub fx_calls: AtomicUsize,
    pub quote_calls: AtomicUsize,
}

impl FixtureProvider {
    pub fn with_fx_midpoint(mut self, currency: &str, rate: f64) -> Self {
        self.fx.insert(
            currency.to_owned(),
            FxQuote {
                pair: format!("{currency}USD"),
                bid: Some(rate),
                ask: Some(rate),
            },
        );
        self
    }

    pub fn fx_calls(&self) -> usize {
        self.fx_calls.load(Ordering::SeqCst)
    }
}

impl MarketDataProvider for FixtureProvider {
    fn market_caps<'a>(&'a self, symbols: &'a [Symbol]) -> SourceFuture<'a, Vec<MarketCapEntry>> {
        Box::pin(async move {
            if self.market_caps_down {
                return Err(SourceError::unavailable("market-cap endpoint down"));
            }
            Ok(symbols
                .iter()
                .filter_map(|symbol| {
                    self.market_caps
                        .get(symbol.as_str())
                        .map(|market_cap| MarketCapEntry {
                            symbol: symbol.to_string(),
                            market_cap: *market_cap,
                        })
                })
                .collect())
        })
    }

    fn quote<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, EquityQuote> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            self.quotes
                .get(symbol.as_str())
                .cloned()
                .ok_or_else(|| SourceError::unavailable(format!("no quote for {symbol}")))
        })
    }

    fn profile<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, CompanyProfile> {
        Box::pin(async move {
            self.profiles
                .get(symbol.as_str())
                .cloned()
                .ok_or_else(|| SourceError::unavailable(format!("no profile for {symbol}")))
        })
    }

    fn commodity_quotes<'a>(&'a self) -> SourceFuture<'a, Vec<CommodityQuote>> {
        Box::pin(async move {
            self.commodities
                .clone()
                .ok_or_else(|| SourceError::unavailable("commodity endpoint down"))
        })
    }

    fn fx_quote<'a>(&'a self, base: &'a str, _quote: &'a str) -> SourceFuture<'a, FxQuote> {
        self.fx_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            self.fx
                .get(base)
                .cloned()
                .ok_or_else(|| SourceError::unavailable(format!("no fx for {base}")))
        })
    }

    fn screener<'a>(&'a self, query: &'a ScreenerQuery) -> SourceFuture<'a, Vec<ScreenerRow>> {
        Box::pin(async move {
            self.screener
                .get(&query.country)
                .cloned()
                .ok_or_else(|| SourceError::unavailable(format!("screener down for {}", query.country)))
        })
    }
}

pub(crate) fn record(ticker: &str, name: &str, market_cap_usd: f64) -> AssetRecord {
    record_on(ticker, name, market_cap_usd, "NASDAQ", "US")
}

pub(crate) fn record_on(
    ticker: &str,
    name: &str,
    market_cap_usd: f64,
    exchange: &str,
    country: &str,
) -> AssetRecord {
    AssetRecord::new(AssetDraft {
        ticker: ticker.to_owned(),
        name: name.to_owned(),
        market_cap_usd,
        current_price: 10.0,
        previous_close: 10.0,
        primary_exchange: exchange.to_owned(),
        country: country.to_owned(),
        asset_type: AssetType::Stock,
        ..AssetDraft::default()
    })
    .expect("fixture record should be valid")
}
