//! Essential-commodity selection and synthetic market caps.
//!
//! Commodities have no market capitalization. To rank them next to
//! equities each whitelisted contract gets `price × assumed supply`, a
//! ranking approximation and not a financial figure.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::data_source::{CommodityQuote, MarketDataProvider};
use crate::filters::contains_word;
use crate::report::{SkipReason, SourceReport};
use crate::{AssetDraft, AssetRecord, AssetType};

const MICRO_CONTRACTS: &[&str] = &["MGCUSD", "SILUSD"];

const ESSENTIAL_NAMES: &[&str] = &["GOLD", "SILVER", "PLATINUM", "PALLADIUM", "COPPER"];

/// Main contracts and their assumed above-ground supply.
const ASSUMED_SUPPLY: &[(&str, f64)] = &[
    ("GCUSD", 6.4e9),
    ("SIUSD", 54.6e9),
    ("PLUSD", 257e6),
    ("PAUSD", 175e6),
    ("HGUSD", 700e6),
];

const DEFAULT_SUPPLY: f64 = 1e9;

pub fn is_essential_commodity(name: &str, symbol: &str) -> bool {
    let symbol = symbol.trim();
    if MICRO_CONTRACTS
        .iter()
        .any(|micro| micro.eq_ignore_ascii_case(symbol))
    {
        return false;
    }

    ESSENTIAL_NAMES.iter().any(|word| contains_word(name, word))
        || ASSUMED_SUPPLY
            .iter()
            .any(|(main, _)| main.eq_ignore_ascii_case(symbol))
}

pub fn synthetic_market_cap(symbol: &str, price: f64) -> f64 {
    let supply = ASSUMED_SUPPLY
        .iter()
        .find(|(main, _)| main.eq_ignore_ascii_case(symbol.trim()))
        .map(|(_, supply)| *supply)
        .unwrap_or(DEFAULT_SUPPLY);
    price * supply
}

/// Filter quotes down to essential commodities and build their records.
pub fn normalize_commodities(quotes: Vec<CommodityQuote>) -> (Vec<AssetRecord>, SourceReport) {
    let mut report = SourceReport::new("commodities");
    report.batches_requested = 1;
    report.requested = quotes.len();
    report.received = quotes.len();

    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for quote in quotes {
        if !is_essential_commodity(&quote.name, &quote.symbol) {
            report.skip(SkipReason::NotEssentialCommodity);
            continue;
        }

        let symbol = quote.symbol.trim().to_ascii_uppercase();
        if !seen.insert(symbol.clone()) {
            report.skip(SkipReason::DuplicateSymbol);
            continue;
        }

        let price = quote.price.unwrap_or(0.0);
        let market_cap = synthetic_market_cap(&symbol, price);
        if !market_cap.is_finite() || market_cap <= 0.0 {
            debug!(symbol = %symbol, price, "commodity without a usable price");
            report.skip(SkipReason::NonPositiveMarketCap);
            continue;
        }

        let draft = AssetDraft {
            ticker: symbol.clone(),
            name: quote.name,
            market_cap_usd: market_cap,
            current_price: price,
            previous_close: quote.previous_close.unwrap_or(price),
            percentage_change: quote.change_percent.unwrap_or(0.0),
            volume: 0.0,
            primary_exchange: quote.exchange.unwrap_or_else(|| String::from("COMMODITY")),
            country: String::from("Global"),
            sector: String::from("Commodities"),
            industry: String::from("Commodities"),
            asset_type: AssetType::Commodity,
            image: None,
            currency: String::from("USD"),
        };

        match AssetRecord::new(draft) {
            Ok(record) => records.push(record),
            Err(error) => {
                debug!(symbol = %symbol, error = %error, "invalid commodity record");
                report.skip(SkipReason::InvalidRecord);
            }
        }
    }

    report.processed = records.len();
    (records, report)
}

/// Fetches and normalizes commodity quotes. A failed fetch yields no records.
#[derive(Clone)]
pub struct CommodityNormalizer {
    provider: Arc<dyn MarketDataProvider>,
}

impl CommodityNormalizer {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }

    pub async fn collect(&self) -> (Vec<AssetRecord>, SourceReport) {
        match self.provider.commodity_quotes().await {
            Ok(quotes) => normalize_commodities(quotes),
            Err(error) => {
                warn!(error = %error, "commodity quotes unavailable");
                let mut report = SourceReport::new("commodities");
                report.batches_requested = 1;
                report.batches_failed = 1;
                report.skip(SkipReason::BatchFailed);
                (Vec::new(), report)
            }
        }
    }
}
