use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::data_source::{
    CommodityQuote, CompanyProfile, EquityQuote, FxQuote, MarketCapEntry, MarketDataProvider,
    ScreenerQuery, ScreenerRow, SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::provider_policy::ProviderPolicy;
use crate::retry::AttemptFailure;
use crate::throttling::RequestThrottle;
use crate::Symbol;

/// Financial Modeling Prep adapter.
///
/// The API key travels as the `apikey` query parameter and is masked in
/// every log line and error message.
#[derive(Clone)]
pub struct FmpAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    policy: ProviderPolicy,
    throttle: RequestThrottle,
}

impl FmpAdapter {
    pub fn new(api_key: impl Into<String>, policy: ProviderPolicy) -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()), api_key, policy)
    }

    pub fn with_http_client(
        http_client: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        policy: ProviderPolicy,
    ) -> Self {
        let throttle = RequestThrottle::from_policy(&policy);
        Self {
            http_client,
            api_key: api_key.into(),
            policy,
            throttle,
        }
    }

    pub fn policy(&self) -> &ProviderPolicy {
        &self.policy
    }

    fn request(&self, path: &str) -> HttpRequest {
        let timeout_ms = u64::try_from(self.policy.request_timeout.as_millis()).unwrap_or(u64::MAX);
        HttpRequest::get(format!("{}{path}", self.policy.base_url)).with_timeout_ms(timeout_ms)
    }

    /// Throttled, retried GET decoded as JSON.
    async fn get_json<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, SourceError> {
        let request = request.with_query("apikey", self.api_key.as_str());
        let redacted = request.redacted_url();
        let mut attempt: u32 = 0;

        loop {
            self.throttle.until_ready().await;
            debug!(url = %redacted, attempt, "fmp request");

            let delay = match self.http_client.execute(request.clone()).await {
                Ok(response) if response.is_success() => {
                    return serde_json::from_str(&response.body).map_err(|error| {
                        SourceError::parse(format!("failed to parse fmp response from {redacted}: {error}"))
                    });
                }
                Ok(response) => {
                    match self
                        .policy
                        .retry
                        .next_delay(attempt, AttemptFailure::Status(response.status))
                    {
                        Some(delay) => delay,
                        None => return Err(status_error(response.status, &redacted)),
                    }
                }
                Err(error) => {
                    match self
                        .policy
                        .retry
                        .next_delay(attempt, AttemptFailure::Transport(&error))
                    {
                        Some(delay) => delay,
                        None => {
                            return Err(SourceError::unavailable(format!(
                                "fmp transport error for {redacted}: {}",
                                error.message()
                            )))
                        }
                    }
                }
            };

            warn!(
                url = %redacted,
                attempt,
                delay_ms = delay_millis(delay),
                "retrying fmp request"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    async fn fetch_market_caps(&self, symbols: &[Symbol]) -> Result<Vec<MarketCapEntry>, SourceError> {
        if symbols.is_empty() {
            return Err(SourceError::invalid_request(
                "market cap batch must include at least one symbol",
            ));
        }

        let joined = symbols
            .iter()
            .map(|symbol| urlencoding::encode(symbol.as_str()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        let rows: Vec<FmpMarketCap> = self
            .get_json(self.request(&format!("/v3/market-capitalization/{joined}")))
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                Some(MarketCapEntry {
                    symbol: row.symbol,
                    market_cap: row.market_cap?,
                })
            })
            .collect())
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<EquityQuote, SourceError> {
        let path = format!("/v3/quote/{}", urlencoding::encode(symbol.as_str()));
        let rows: Vec<FmpQuote> = self.get_json(self.request(&path)).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::unavailable(format!("no quote data for {symbol}")))?;

        Ok(EquityQuote {
            symbol: row.symbol,
            name: row.name,
            price: row.price,
            previous_close: row.previous_close,
            change_percent: row.changes_percentage,
            volume: row.volume,
            market_cap: row.market_cap,
            exchange: row.exchange,
        })
    }

    async fn fetch_profile(&self, symbol: &Symbol) -> Result<CompanyProfile, SourceError> {
        let path = format!("/v3/profile/{}", urlencoding::encode(symbol.as_str()));
        let rows: Vec<FmpProfile> = self.get_json(self.request(&path)).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::unavailable(format!("no profile data for {symbol}")))?;

        Ok(CompanyProfile {
            symbol: row.symbol,
            company_name: row.company_name,
            image: row.image,
            sector: row.sector,
            industry: row.industry,
            country: row.country,
            exchange: row.exchange_short_name.or(row.exchange),
            is_etf: row.is_etf.unwrap_or(false),
            is_fund: row.is_fund.unwrap_or(false),
            is_actively_trading: row.is_actively_trading.unwrap_or(true),
        })
    }

    async fn fetch_commodities(&self) -> Result<Vec<CommodityQuote>, SourceError> {
        let rows: Vec<FmpQuote> = self.get_json(self.request("/v3/quotes/commodity")).await?;
        Ok(rows
            .into_iter()
            .map(|row| CommodityQuote {
                name: row.name.unwrap_or_else(|| row.symbol.clone()),
                symbol: row.symbol,
                price: row.price,
                previous_close: row.previous_close,
                change_percent: row.changes_percentage,
                volume: row.volume,
                exchange: row.exchange,
            })
            .collect())
    }

    async fn fetch_fx(&self, base: &str, quote: &str) -> Result<FxQuote, SourceError> {
        let pair = format!("{}{}", base.to_ascii_uppercase(), quote.to_ascii_uppercase());
        let path = format!("/v3/fx/{}", urlencoding::encode(&pair));
        let rows: Vec<FmpFx> = self.get_json(self.request(&path)).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::unavailable(format!("no fx data for {pair}")))?;

        Ok(FxQuote {
            pair,
            bid: row.bid.and_then(FlexibleNumber::into_f64),
            ask: row.ask.and_then(FlexibleNumber::into_f64),
        })
    }

    async fn fetch_screener(&self, query: &ScreenerQuery) -> Result<Vec<ScreenerRow>, SourceError> {
        let request = self
            .request("/v3/stock-screener")
            .with_query("marketCapMoreThan", format!("{:.0}", query.min_market_cap))
            .with_query("country", query.country.as_str())
            .with_query("isActivelyTrading", "true")
            .with_query("limit", query.limit.to_string())
            .with_query("sortBy", "marketcap")
            .with_query("order", "desc");
        let rows: Vec<FmpScreenerRow> = self.get_json(request).await?;

        Ok(rows
            .into_iter()
            .map(|row| ScreenerRow {
                symbol: row.symbol,
                company_name: row.company_name,
                market_cap: row.market_cap,
                sector: row.sector,
                industry: row.industry,
                country: row.country,
                exchange: row.exchange_short_name.or(row.exchange),
                price: row.price,
                volume: row.volume,
                is_etf: row.is_etf.unwrap_or(false),
                is_fund: row.is_fund.unwrap_or(false),
                is_actively_trading: row.is_actively_trading.unwrap_or(true),
            })
            .collect())
    }
}

impl MarketDataProvider for FmpAdapter {
    fn market_caps<'a>(&'a self, symbols: &'a [Symbol]) -> SourceFuture<'a, Vec<MarketCapEntry>> {
        Box::pin(self.fetch_market_caps(symbols))
    }

    fn quote<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, EquityQuote> {
        Box::pin(self.fetch_quote(symbol))
    }

    fn profile<'a>(&'a self, symbol: &'a Symbol) -> SourceFuture<'a, CompanyProfile> {
        Box::pin(self.fetch_profile(symbol))
    }

    fn commodity_quotes<'a>(&'a self) -> SourceFuture<'a, Vec<CommodityQuote>> {
        Box::pin(self.fetch_commodities())
    }

    fn fx_quote<'a>(&'a self, base: &'a str, quote: &'a str) -> SourceFuture<'a, FxQuote> {
        Box::pin(self.fetch_fx(base, quote))
    }

    fn screener<'a>(&'a self, query: &'a ScreenerQuery) -> SourceFuture<'a, Vec<ScreenerRow>> {
        Box::pin(self.fetch_screener(query))
    }
}

fn status_error(status: u16, redacted: &str) -> SourceError {
    let message = format!("fmp returned status {status} for {redacted}");
    match status {
        429 => SourceError::rate_limited(message),
        400..=499 => SourceError::invalid_request(message),
        _ => SourceError::unavailable(message),
    }
}

async fn sleep(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

// FMP response structures

#[derive(Debug, Deserialize)]
struct FmpMarketCap {
    symbol: String,
    #[serde(rename = "marketCap")]
    market_cap: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpQuote {
    symbol: String,
    name: Option<String>,
    price: Option<f64>,
    changes_percentage: Option<f64>,
    market_cap: Option<f64>,
    previous_close: Option<f64>,
    volume: Option<f64>,
    exchange: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpProfile {
    symbol: String,
    company_name: Option<String>,
    image: Option<String>,
    sector: Option<String>,
    industry: Option<String>,
    country: Option<String>,
    exchange: Option<String>,
    exchange_short_name: Option<String>,
    is_etf: Option<bool>,
    is_fund: Option<bool>,
    is_actively_trading: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FmpScreenerRow {
    symbol: String,
    company_name: Option<String>,
    market_cap: Option<f64>,
    sector: Option<String>,
    industry: Option<String>,
    country: Option<String>,
    exchange: Option<String>,
    exchange_short_name: Option<String>,
    price: Option<f64>,
    volume: Option<f64>,
    is_etf: Option<bool>,
    is_fund: Option<bool>,
    is_actively_trading: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct FmpFx {
    #[serde(default)]
    bid: Option<FlexibleNumber>,
    #[serde(default)]
    ask: Option<FlexibleNumber>,
}

/// FX bid/ask arrive either as JSON numbers or numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlexibleNumber {
    Number(f64),
    Text(String),
}

impl FlexibleNumber {
    fn into_f64(self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(value),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpError, HttpResponse};
    use crate::retry::RetryConfig;

    struct ScriptedHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttpClient {
        fn new(responses: Vec<Result<HttpResponse, HttpError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self
                .responses
                .lock()
                .expect("response script should not be poisoned")
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::with_status(404, "[]")));
            Box::pin(async move { response })
        }
    }

    fn adapter(client: Arc<ScriptedHttpClient>) -> FmpAdapter {
        let policy = ProviderPolicy::fmp_default()
            .with_base_url("https://fmp.test/api")
            .with_retry(RetryConfig::fixed(Duration::ZERO, 2));
        FmpAdapter::with_http_client(client, "secret-key", policy)
    }

    fn symbol(value: &str) -> Symbol {
        Symbol::parse(value).expect("valid symbol")
    }

    #[tokio::test]
    async fn quote_request_appends_api_key_query_parameter() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            r#"[{"symbol":"AAPL","name":"Apple Inc.","price":190.5,"changesPercentage":1.2,
                "marketCap":2950000000000,"previousClose":188.2,"volume":51000000,"exchange":"NASDAQ"}]"#,
        ))]));
        let quote = adapter(Arc::clone(&client))
            .quote(&symbol("AAPL"))
            .await
            .expect("quote should succeed");

        assert_eq!(quote.price, Some(190.5));
        assert_eq!(quote.market_cap, Some(2.95e12));
        assert_eq!(quote.exchange.as_deref(), Some("NASDAQ"));

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].full_url(),
            "https://fmp.test/api/v3/quote/AAPL?apikey=secret-key"
        );
        assert_eq!(requests[0].timeout_ms, 30_000);
    }

    #[tokio::test]
    async fn market_cap_batch_joins_symbols() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            r#"[{"symbol":"0700.HK","date":"2026-10-14","marketCap":3.1e12},
                {"symbol":"MSFT","date":"2026-10-14","marketCap":null}]"#,
        ))]));
        let entries = adapter(Arc::clone(&client))
            .market_caps(&[symbol("0700.HK"), symbol("MSFT")])
            .await
            .expect("batch should succeed");

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].symbol, "0700.HK");
        assert!(client.recorded_requests()[0]
            .url
            .ends_with("/v3/market-capitalization/0700.HK,MSFT"));
    }

    #[tokio::test]
    async fn fx_quote_accepts_string_bid_and_ask() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            r#"[{"ticker":"HKD/USD","bid":"0.1279","ask":0.1281,"date":"2026-10-14"}]"#,
        ))]));
        let fx = adapter(client).fx_quote("hkd", "usd").await.expect("fx quote");

        assert_eq!(fx.pair, "HKDUSD");
        assert!((fx.midpoint().expect("midpoint") - 0.128).abs() < 1e-9);
    }

    #[tokio::test]
    async fn rate_limited_call_is_retried_then_succeeds() {
        let client = Arc::new(ScriptedHttpClient::new(vec![
            Ok(HttpResponse::with_status(429, "Limit Reach")),
            Ok(HttpResponse::with_status(503, "busy")),
            Ok(HttpResponse::ok_json(r#"[{"symbol":"GCUSD","name":"Gold","price":2400.0}]"#)),
        ]));
        let quotes = adapter(Arc::clone(&client))
            .commodity_quotes()
            .await
            .expect("third attempt should succeed");

        assert_eq!(quotes.len(), 1);
        assert_eq!(client.recorded_requests().len(), 3);
    }

    #[tokio::test]
    async fn non_retryable_status_fails_without_leaking_api_key() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::with_status(
            401,
            r#"{"Error Message":"Invalid API KEY."}"#,
        ))]));
        let error = adapter(Arc::clone(&client))
            .profile(&symbol("AAPL"))
            .await
            .expect_err("401 must fail");

        assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
        assert!(!error.message().contains("secret-key"));
        assert_eq!(client.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn error_body_with_success_status_is_a_parse_error() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            r#"{"Error Message":"Limit Reach"}"#,
        ))]));
        let error = adapter(client)
            .quote(&symbol("AAPL"))
            .await
            .expect_err("object body must fail");

        assert_eq!(error.kind(), SourceErrorKind::Parse);
    }

    #[tokio::test]
    async fn screener_sends_filters() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::ok_json(
            r#"[{"symbol":"SAP.DE","companyName":"SAP SE","marketCap":2.5e11,"country":"DE",
                 "exchangeShortName":"XETRA","isEtf":false,"isActivelyTrading":true}]"#,
        ))]));
        let rows = adapter(Arc::clone(&client))
            .screener(&ScreenerQuery {
                country: String::from("DE"),
                min_market_cap: 1e9,
                limit: 1000,
            })
            .await
            .expect("screener should succeed");

        assert_eq!(rows[0].exchange.as_deref(), Some("XETRA"));
        let url = client.recorded_requests()[0].full_url();
        assert!(url.contains("marketCapMoreThan=1000000000"));
        assert!(url.contains("country=DE"));
        assert!(url.contains("isActivelyTrading=true"));
        assert!(url.contains("limit=1000"));
        assert!(url.contains("sortBy=marketcap&order=desc"));
    }

    #[test]
    fn retry_delays_saturate_instead_of_wrapping() {
        assert_eq!(delay_millis(Duration::from_millis(250)), 250);
        assert_eq!(delay_millis(Duration::MAX), u64::MAX);
    }
}
