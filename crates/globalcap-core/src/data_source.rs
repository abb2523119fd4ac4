//! Market-data provider contract and provider-neutral payloads.
//!
//! # Endpoints
//!
//! | Method | Response | Description |
//! |--------|----------|-------------|
//! | [`MarketDataProvider::market_caps`] | [`MarketCapEntry`] | Batch market caps, native currency |
//! | [`MarketDataProvider::quote`] | [`EquityQuote`] | Real-time quote for one symbol |
//! | [`MarketDataProvider::profile`] | [`CompanyProfile`] | Company metadata |
//! | [`MarketDataProvider::commodity_quotes`] | [`CommodityQuote`] | All commodity quotes |
//! | [`MarketDataProvider::fx_quote`] | [`FxQuote`] | Currency pair bid/ask |
//! | [`MarketDataProvider::screener`] | [`ScreenerRow`] | Stock screener by country |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::Symbol;

/// Boxed future returned by provider calls.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    InvalidRequest,
    Parse,
    Internal,
}

/// Recoverable per-call failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Parse,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Parse => "source.parse",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Market cap from the batch endpoint. The figure is in the listing's
/// native currency.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketCapEntry {
    pub symbol: String,
    pub market_cap: f64,
}

/// Real-time quote. Prices and `market_cap` are as reported upstream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EquityQuote {
    pub symbol: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub previous_close: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub exchange: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompanyProfile {
    pub symbol: String,
    pub company_name: Option<String>,
    pub image: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub exchange: Option<String>,
    pub is_etf: bool,
    pub is_fund: bool,
    pub is_actively_trading: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommodityQuote {
    pub symbol: String,
    pub name: String,
    pub price: Option<f64>,
    pub previous_close: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<f64>,
    pub exchange: Option<String>,
}

/// Bid/ask for `{base}{quote}`.
#[derive(Debug, Clone, PartialEq)]
pub struct FxQuote {
    pub pair: String,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
}

impl FxQuote {
    /// Bid/ask midpoint; `None` unless both sides are positive and finite.
    pub fn midpoint(&self) -> Option<f64> {
        let bid = self.bid.filter(|value| value.is_finite() && *value > 0.0)?;
        let ask = self.ask.filter(|value| value.is_finite() && *value > 0.0)?;
        Some((bid + ask) / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenerQuery {
    pub country: String,
    pub min_market_cap: f64,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScreenerRow {
    pub symbol: String,
    pub company_name: Option<String>,
    pub market_cap: Option<f64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub exchange: Option<String>,
    pub price: Option<f64>,
    pub volume: Option<f64>,
    pub is_etf: bool,
    pub is_fund: bool,
    pub is_actively_trading: bool,
}

/// Upstream market-data contract. Every method is one network round trip
/// and fails independently.
pub trait MarketDataProvider: Send + Sync {
    fn market_caps<'a>(&'a self, symbols: &'a [Symbol]) -> SourceFuture<'a, Vec<MarketCapEntry>>;

    fn quote<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, EquityQuote>;

    fn profile<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, CompanyProfile>;

    fn commodity_quotes<'a>(&'a self) -> SourceFuture<'a, Vec<CommodityQuote>>;

    fn fx_quote<'a>(&'a self, base: &'a str, quote: &'a str) -> SourceFuture<'a, FxQuote>;

    fn screener<'a>(&'a self, query: &'a ScreenerQuery) -> SourceFuture<'a, Vec<ScreenerRow>>;
}
