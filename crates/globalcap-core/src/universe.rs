//! Symbol universes: where equity candidates come from.

use std::collections::HashSet;

use crate::data_source::{MarketDataProvider, ScreenerQuery, ScreenerRow, SourceFuture};
use crate::report::SkipReason;
use crate::Symbol;

/// Unit of upstream work.
#[derive(Debug, Clone, PartialEq)]
pub enum UniverseBatch {
    /// Resolved through the batch market-cap endpoint.
    MarketCaps(Vec<Symbol>),
    /// Resolved through the stock screener.
    Screener(ScreenerQuery),
}

impl UniverseBatch {
    pub fn label(&self) -> String {
        match self {
            Self::MarketCaps(symbols) => match (symbols.first(), symbols.last()) {
                (Some(first), Some(last)) => format!("{first}..{last}"),
                _ => String::from("empty"),
            },
            Self::Screener(query) => format!("screener:{}", query.country),
        }
    }

    /// Symbols known before resolution. Screener batches only learn theirs
    /// from the response, so they report zero.
    pub fn symbol_count(&self) -> usize {
        match self {
            Self::MarketCaps(symbols) => symbols.len(),
            Self::Screener(_) => 0,
        }
    }
}

/// Symbol plus whatever the batch step already knows about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub symbol: Symbol,
    /// Native-currency market cap from the batch step.
    pub batch_market_cap: f64,
    pub screener: Option<ScreenerRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResolution {
    pub requested: usize,
    pub candidates: Vec<Candidate>,
    pub discarded: Vec<(String, SkipReason)>,
}

/// Strategy for enumerating and resolving equity candidates.
pub trait SymbolUniverse: Send + Sync {
    fn name(&self) -> &'static str;

    fn batches(&self) -> Vec<UniverseBatch>;

    fn resolve<'a>(
        &'a self,
        provider: &'a dyn MarketDataProvider,
        batch: &'a UniverseBatch,
    ) -> SourceFuture<'a, BatchResolution> {
        Box::pin(async move {
            match batch {
                UniverseBatch::MarketCaps(symbols) => resolve_market_caps(provider, symbols).await,
                UniverseBatch::Screener(query) => resolve_screener(provider, query).await,
            }
        })
    }
}

async fn resolve_market_caps(
    provider: &dyn MarketDataProvider,
    symbols: &[Symbol],
) -> Result<BatchResolution, crate::data_source::SourceError> {
    let entries = provider.market_caps(symbols).await?;
    let mut candidates = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();

    for entry in entries {
        // keep the requested spelling; drop anything the batch did not ask for
        let Some(symbol) = symbols
            .iter()
            .find(|symbol| symbol.as_str().eq_ignore_ascii_case(entry.symbol.trim()))
        else {
            continue;
        };
        if !seen.insert(symbol.clone()) {
            continue;
        }
        candidates.push(Candidate {
            symbol: symbol.clone(),
            batch_market_cap: entry.market_cap,
            screener: None,
        });
    }

    Ok(BatchResolution {
        requested: symbols.len(),
        candidates,
        discarded: Vec::new(),
    })
}

async fn resolve_screener(
    provider: &dyn MarketDataProvider,
    query: &ScreenerQuery,
) -> Result<BatchResolution, crate::data_source::SourceError> {
    let rows = provider.screener(query).await?;
    let mut resolution = BatchResolution {
        requested: rows.len(),
        ..BatchResolution::default()
    };
    let mut seen = HashSet::new();

    for row in rows {
        if row.is_etf || row.is_fund || !row.is_actively_trading {
            resolution
                .discarded
                .push((row.symbol.clone(), SkipReason::InactiveOrEtf));
            continue;
        }
        let Ok(symbol) = Symbol::parse(&row.symbol) else {
            resolution
                .discarded
                .push((row.symbol.clone(), SkipReason::InvalidRecord));
            continue;
        };
        if !seen.insert(symbol.clone()) {
            resolution
                .discarded
                .push((row.symbol.clone(), SkipReason::DuplicateSymbol));
            continue;
        }
        resolution.candidates.push(Candidate {
            symbol,
            batch_market_cap: row.market_cap.unwrap_or(0.0),
            screener: Some(row),
        });
    }

    Ok(resolution)
}

/// Injected, ordered symbol list grouped into fixed-size batches.
#[derive(Debug, Clone)]
pub struct CuratedUniverse {
    symbols: Vec<Symbol>,
    batch_size: usize,
}

impl CuratedUniverse {
    /// Repeated symbols are dropped, first occurrence wins.
    pub fn new(symbols: Vec<Symbol>, batch_size: usize) -> Self {
        let mut seen = HashSet::new();
        let symbols = symbols
            .into_iter()
            .filter(|symbol| seen.insert(symbol.clone()))
            .collect();
        Self {
            symbols,
            batch_size: batch_size.max(1),
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }
}

impl SymbolUniverse for CuratedUniverse {
    fn name(&self) -> &'static str {
        "curated"
    }

    fn batches(&self) -> Vec<UniverseBatch> {
        self.symbols
            .chunks(self.batch_size)
            .map(|chunk| UniverseBatch::MarketCaps(chunk.to_vec()))
            .collect()
    }
}

/// One screener batch per country.
#[derive(Debug, Clone)]
pub struct ScreenerUniverse {
    countries: Vec<String>,
    min_market_cap: f64,
    limit: usize,
}

impl ScreenerUniverse {
    pub fn new(countries: Vec<String>, min_market_cap: f64, limit: usize) -> Self {
        let mut seen = HashSet::new();
        let countries = countries
            .into_iter()
            .map(|country| country.trim().to_ascii_uppercase())
            .filter(|country| !country.is_empty() && seen.insert(country.clone()))
            .collect();
        Self {
            countries,
            min_market_cap,
            limit,
        }
    }
}

impl SymbolUniverse for ScreenerUniverse {
    fn name(&self) -> &'static str {
        "screener"
    }

    fn batches(&self) -> Vec<UniverseBatch> {
        self.countries
            .iter()
            .map(|country| {
                UniverseBatch::Screener(ScreenerQuery {
                    country: country.clone(),
                    min_market_cap: self.min_market_cap,
                    limit: self.limit,
                })
            })
            .collect()
    }
}

/// Large caps across the major venues, used when no symbol file is given.
pub const DEFAULT_CURATED_SYMBOLS: &[&str] = &[
    // United States
    "AAPL", "MSFT", "NVDA", "GOOGL", "AMZN", "META", "BRK-B", "AVGO", "TSLA", "LLY", "JPM", "V",
    "WMT", "UNH", "XOM", "MA", "ORCL", "COST", "JNJ", "PG", "HD", "NFLX", "ABBV", "BAC", "KO",
    "CRM", "CVX", "MRK", "AMD", "PEP", "TMO", "ADBE", "CSCO", "LIN", "MCD", "ABT", "WFC", "ACN",
    "IBM", "GE", "PM", "QCOM", "TXN", "INTU", "DIS", "CAT", "VZ", "AMGN", "NOW", "GS", "MS",
    "PLD", "AMT", "O", "EQIX",
    // Depositary receipts listed in New York
    "TSM", "BABA", "ASML", "NVO", "TM", "SAP", "SHEL", "AZN", "HSBC", "TCEHY", "PDD",
    // Hong Kong, mainland China, Taiwan
    "0700.HK", "9988.HK", "1299.HK", "0939.HK", "1398.HK", "3690.HK", "0941.HK", "2318.HK",
    "600519.SS", "601398.SS", "601288.SS", "600036.SS", "300750.SZ", "000858.SZ", "2330.TW",
    "2317.TW", "2454.TW",
    // Japan, Korea, India, Southeast Asia, Australia
    "7203.T", "6758.T", "8306.T", "6861.T", "9984.T", "9432.T", "8035.T", "005930.KS",
    "000660.KS", "373220.KS", "RELIANCE.NS", "TCS.NS", "HDFCBANK.NS", "INFY.NS", "ICICIBANK.NS",
    "BHARTIARTL.NS", "D05.SI", "O39.SI", "BBCA.JK", "BBRI.JK", "PTT.BK", "1155.KL", "BHP.AX",
    "CBA.AX", "CSL.AX",
    // Europe
    "MC.PA", "OR.PA", "RMS.PA", "TTE.PA", "SAN.PA", "AIR.PA", "SAP.DE", "SIE.DE", "ALV.DE",
    "DTE.DE", "ASML.AS", "PRX.AS", "NESN.SW", "ROG.SW", "NOVN.SW", "UBSG.SW", "NOVO-B.CO",
    "AZN.L", "SHEL.L", "HSBA.L", "ULVR.L", "BP.L", "RIO.L", "ENEL.MI", "ISP.MI", "ITX.MC",
    "SAN.MC", "IBE.MC", "ATCO-A.ST", "INVE-B.ST", "EQNR.OL", "NDA-FI.HE", "ABI.BR",
    // Americas and Middle East
    "RY.TO", "TD.TO", "SHOP.TO", "ENB.TO", "CNR.TO", "PETR4.SA", "VALE3.SA", "ITUB4.SA",
    "WALMEX.MX", "2222.SR", "1120.SR", "NICE.TA", "NPN.JO",
];

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::test_support::FixtureProvider;

    fn symbols(values: &[&str]) -> Vec<Symbol> {
        values
            .iter()
            .map(|value| Symbol::parse(value).expect("valid symbol"))
            .collect()
    }

    #[test]
    fn curated_universe_batches_in_order_without_repeats() {
        let universe = CuratedUniverse::new(symbols(&["A", "B", "A", "C", "D", "E"]), 2);
        let batches = universe.batches();

        assert_eq!(
            batches,
            vec![
                UniverseBatch::MarketCaps(symbols(&["A", "B"])),
                UniverseBatch::MarketCaps(symbols(&["C", "D"])),
                UniverseBatch::MarketCaps(symbols(&["E"])),
            ]
        );
    }

    #[test]
    fn default_curated_symbols_parse() {
        for value in DEFAULT_CURATED_SYMBOLS {
            assert!(Symbol::parse(value).is_ok(), "{value}");
        }
    }

    #[test]
    fn screener_universe_has_one_batch_per_country() {
        let universe = ScreenerUniverse::new(
            vec![String::from("us"), String::from("HK"), String::from("US")],
            1e9,
            1000,
        );
        let labels: Vec<String> = universe.batches().iter().map(UniverseBatch::label).collect();

        assert_eq!(labels, vec!["screener:US", "screener:HK"]);
    }

    #[tokio::test]
    async fn screener_rows_for_funds_and_inactive_listings_are_discarded() {
        let row = |symbol: &str, is_etf: bool, active: bool| ScreenerRow {
            symbol: symbol.to_owned(),
            market_cap: Some(5e9),
            is_etf,
            is_actively_trading: active,
            ..ScreenerRow::default()
        };
        let provider = FixtureProvider {
            screener: HashMap::from([(
                String::from("US"),
                vec![row("ACME", false, true), row("SPY", true, true), row("OLD", false, false)],
            )]),
            ..FixtureProvider::default()
        };
        let universe = ScreenerUniverse::new(vec![String::from("US")], 1e9, 10);
        let batch = universe.batches().remove(0);

        let resolution = universe.resolve(&provider, &batch).await.expect("resolves");

        assert_eq!(resolution.requested, 3);
        assert_eq!(resolution.candidates.len(), 1);
        assert_eq!(resolution.candidates[0].symbol.as_str(), "ACME");
        assert_eq!(resolution.discarded.len(), 2);
    }

    #[tokio::test]
    async fn curated_batch_keeps_only_requested_symbols() {
        let provider = FixtureProvider {
            market_caps: HashMap::from([(String::from("ACME"), 5e10), (String::from("ZZZ"), 1.0)]),
            ..FixtureProvider::default()
        };
        let universe = CuratedUniverse::new(symbols(&["ACME", "MISSING"]), 75);
        let batch = universe.batches().remove(0);

        let resolution = universe.resolve(&provider, &batch).await.expect("resolves");

        assert_eq!(resolution.requested, 2);
        assert_eq!(resolution.candidates.len(), 1);
        assert_eq!(resolution.candidates[0].batch_market_cap, 5e10);
    }
}
