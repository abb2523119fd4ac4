//! Currency resolution and USD conversion rates.
//!
//! A listing's native currency comes from its venue suffix (`0700.HK` is
//! HKD), then from the company's country, and defaults to USD. Conversion
//! rates are fetched live once per currency and cached for the run; when
//! the live quote is unusable the versioned fallback table answers instead.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::data_source::MarketDataProvider;
use crate::error::ConfigError;
use crate::Symbol;

/// Exchange suffix with its home country and trading currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingVenue {
    pub suffix: &'static str,
    pub country: &'static str,
    pub currency: &'static str,
}

const fn venue(suffix: &'static str, country: &'static str, currency: &'static str) -> ListingVenue {
    ListingVenue {
        suffix,
        country,
        currency,
    }
}

const LISTING_VENUES: &[ListingVenue] = &[
    venue("HK", "HK", "HKD"),
    venue("T", "JP", "JPY"),
    venue("KS", "KR", "KRW"),
    venue("KQ", "KR", "KRW"),
    venue("NS", "IN", "INR"),
    venue("BO", "IN", "INR"),
    venue("SS", "CN", "CNY"),
    venue("SZ", "CN", "CNY"),
    venue("L", "GB", "GBP"),
    venue("TO", "CA", "CAD"),
    venue("V", "CA", "CAD"),
    venue("AX", "AU", "AUD"),
    venue("PA", "FR", "EUR"),
    venue("DE", "DE", "EUR"),
    venue("AS", "NL", "EUR"),
    venue("MI", "IT", "EUR"),
    venue("MC", "ES", "EUR"),
    venue("BR", "BE", "EUR"),
    venue("LS", "PT", "EUR"),
    venue("HE", "FI", "EUR"),
    venue("VI", "AT", "EUR"),
    venue("IR", "IE", "EUR"),
    venue("SW", "CH", "CHF"),
    venue("ST", "SE", "SEK"),
    venue("OL", "NO", "NOK"),
    venue("CO", "DK", "DKK"),
    venue("JK", "ID", "IDR"),
    venue("SA", "BR", "BRL"),
    venue("SR", "SA", "SAR"),
    venue("TA", "IL", "ILS"),
    venue("JO", "ZA", "ZAR"),
    venue("MX", "MX", "MXN"),
    venue("BK", "TH", "THB"),
    venue("KL", "MY", "MYR"),
    venue("PS", "PH", "PHP"),
    venue("VN", "VN", "VND"),
    venue("TW", "TW", "TWD"),
    venue("TWO", "TW", "TWD"),
    venue("SI", "SG", "SGD"),
    venue("NZ", "NZ", "NZD"),
    venue("SN", "CL", "CLP"),
    venue("BA", "AR", "ARS"),
    venue("LM", "PE", "PEN"),
    venue("IS", "TR", "TRY"),
    venue("ME", "RU", "RUB"),
    venue("EG", "EG", "EGP"),
];

/// ISO-2 country to currency, consulted when the symbol has no known venue.
const COUNTRY_CURRENCIES: &[(&str, &str)] = &[
    ("US", "USD"),
    ("CA", "CAD"),
    ("GB", "GBP"),
    ("JP", "JPY"),
    ("CN", "CNY"),
    ("HK", "HKD"),
    ("KR", "KRW"),
    ("IN", "INR"),
    ("AU", "AUD"),
    ("NZ", "NZD"),
    ("CH", "CHF"),
    ("SE", "SEK"),
    ("NO", "NOK"),
    ("DK", "DKK"),
    ("DE", "EUR"),
    ("FR", "EUR"),
    ("NL", "EUR"),
    ("IT", "EUR"),
    ("ES", "EUR"),
    ("BE", "EUR"),
    ("PT", "EUR"),
    ("FI", "EUR"),
    ("AT", "EUR"),
    ("IE", "EUR"),
    ("LU", "EUR"),
    ("GR", "EUR"),
    ("BR", "BRL"),
    ("MX", "MXN"),
    ("AR", "ARS"),
    ("CL", "CLP"),
    ("CO", "COP"),
    ("PE", "PEN"),
    ("ZA", "ZAR"),
    ("SA", "SAR"),
    ("IL", "ILS"),
    ("TR", "TRY"),
    ("RU", "RUB"),
    ("EG", "EGP"),
    ("ID", "IDR"),
    ("TH", "THB"),
    ("MY", "MYR"),
    ("PH", "PHP"),
    ("VN", "VND"),
    ("TW", "TWD"),
    ("SG", "SGD"),
];

/// Venue for the symbol's exchange suffix, if the suffix is known.
///
/// A dot alone does not make a venue: `BRK.B` has no listed suffix.
pub fn venue_of(symbol: &Symbol) -> Option<&'static ListingVenue> {
    let suffix = symbol.suffix()?;
    LISTING_VENUES.iter().find(|venue| venue.suffix == suffix)
}

/// [`venue_of`] for raw input. Unparseable symbols have no venue.
pub fn venue_for_symbol(symbol: &str) -> Option<&'static ListingVenue> {
    venue_of(&Symbol::parse(symbol).ok()?)
}

/// Native currency for a listing: venue suffix first, then country, then USD.
pub fn resolve_currency(symbol: &str, country: &str) -> &'static str {
    if let Some(venue) = venue_for_symbol(symbol) {
        return venue.currency;
    }

    let country = country.trim();
    COUNTRY_CURRENCIES
        .iter()
        .find(|(code, _)| code.eq_ignore_ascii_case(country))
        .map(|(_, currency)| *currency)
        .unwrap_or("USD")
}

/// Where a USD rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// USD itself.
    Identity,
    /// Live bid/ask midpoint.
    Live,
    /// Versioned fallback table.
    Fallback,
    /// Unknown currency, treated as USD.
    Assumed,
}

/// Multiplier converting one unit of a currency into USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsdRate {
    pub rate: f64,
    pub source: RateSource,
}

/// Emergency conversion table used when the live quote is unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackRates {
    pub version: String,
    pub rates: BTreeMap<String, f64>,
}

impl Default for FallbackRates {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FallbackRates {
    pub fn builtin() -> Self {
        let rates = [
            ("ARS", 0.0010),
            ("AUD", 0.64),
            ("BRL", 0.18),
            ("CAD", 0.74),
            ("CHF", 1.12),
            ("CLP", 0.0010),
            ("CNY", 0.14),
            ("COP", 0.00025),
            ("DKK", 0.145),
            ("EGP", 0.020),
            ("EUR", 1.08),
            ("GBP", 1.26),
            ("HKD", 0.128),
            ("IDR", 0.000065),
            ("ILS", 0.27),
            ("INR", 0.012),
            ("JPY", 0.0067),
            ("KRW", 0.00075),
            ("MXN", 0.058),
            ("MYR", 0.22),
            ("NOK", 0.094),
            ("NZD", 0.60),
            ("PEN", 0.27),
            ("PHP", 0.018),
            ("RUB", 0.010),
            ("SAR", 0.267),
            ("SEK", 0.095),
            ("SGD", 0.74),
            ("THB", 0.029),
            ("TRY", 0.029),
            ("TWD", 0.031),
            ("VND", 0.00004),
            ("ZAR", 0.055),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_owned(), rate))
        .collect();

        Self {
            version: String::from("builtin-2024.1"),
            rates,
        }
    }

    /// Load a table from JSON: `{"version": "...", "rates": {"HKD": 0.128}}`.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        table.validate()?;
        Ok(table.normalized())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::invalid("fx_fallback.version", "must not be empty"));
        }
        for (code, rate) in &self.rates {
            crate::validate_currency_code(code)
                .map_err(|error| ConfigError::invalid("fx_fallback.rates", error.to_string()))?;
            if !rate.is_finite() || *rate <= 0.0 {
                return Err(ConfigError::invalid(
                    "fx_fallback.rates",
                    format!("rate for {code} must be positive, got {rate}"),
                ));
            }
        }
        Ok(())
    }

    pub fn rate(&self, currency: &str) -> Option<f64> {
        self.rates.get(currency).copied()
    }

    fn normalized(self) -> Self {
        Self {
            version: self.version,
            rates: self
                .rates
                .into_iter()
                .map(|(code, rate)| (code.trim().to_ascii_uppercase(), rate))
                .collect(),
        }
    }
}

/// Run-scoped currency to USD cache shared by every worker.
#[derive(Debug, Clone, Default)]
pub struct ExchangeRateCache {
    rates: Arc<RwLock<HashMap<String, UsdRate>>>,
}

impl ExchangeRateCache {
    pub async fn get(&self, currency: &str) -> Option<UsdRate> {
        self.rates.read().await.get(currency).copied()
    }

    pub async fn insert(&self, currency: &str, rate: UsdRate) {
        self.rates.write().await.insert(currency.to_owned(), rate);
    }

    /// Every rate resolved so far, ordered by currency.
    pub async fn snapshot(&self) -> BTreeMap<String, UsdRate> {
        self.rates
            .read()
            .await
            .iter()
            .map(|(code, rate)| (code.clone(), *rate))
            .collect()
    }
}

/// Live-first USD rate lookup.
#[derive(Clone)]
pub struct CurrencyResolver {
    provider: Arc<dyn MarketDataProvider>,
    fallback: Arc<FallbackRates>,
    cache: ExchangeRateCache,
    // serializes cache misses so each currency is fetched once per run
    fetch_gate: Arc<Mutex<()>>,
}

impl CurrencyResolver {
    pub fn new(provider: Arc<dyn MarketDataProvider>, fallback: FallbackRates) -> Self {
        Self {
            provider,
            fallback: Arc::new(fallback),
            cache: ExchangeRateCache::default(),
            fetch_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn cache(&self) -> &ExchangeRateCache {
        &self.cache
    }

    pub fn fallback_version(&self) -> &str {
        &self.fallback.version
    }

    /// USD multiplier for `currency`. Never fails.
    ///
    /// Cache hits only take the read lock. A worker that misses while
    /// another is fetching waits for it and reuses the stored rate.
    pub async fn usd_rate(&self, currency: &str) -> UsdRate {
        let code = currency.trim().to_ascii_uppercase();
        if code == "USD" {
            return UsdRate {
                rate: 1.0,
                source: RateSource::Identity,
            };
        }

        if let Some(cached) = self.cache.get(&code).await {
            return cached;
        }

        let _gate = self.fetch_gate.lock().await;
        if let Some(cached) = self.cache.get(&code).await {
            return cached;
        }

        let resolved = match self.provider.fx_quote(&code, "USD").await {
            Ok(quote) => match quote.midpoint() {
                Some(rate) => {
                    debug!(currency = %code, rate, "live fx rate");
                    Some(UsdRate {
                        rate,
                        source: RateSource::Live,
                    })
                }
                None => {
                    debug!(currency = %code, "live fx quote had no usable bid/ask");
                    None
                }
            },
            Err(error) => {
                debug!(currency = %code, error = %error, "live fx quote failed");
                None
            }
        };

        let resolved = resolved.unwrap_or_else(|| match self.fallback.rate(&code) {
            Some(rate) => {
                warn!(
                    currency = %code,
                    rate,
                    table = %self.fallback.version,
                    "using fallback fx rate"
                );
                UsdRate {
                    rate,
                    source: RateSource::Fallback,
                }
            }
            None => {
                warn!(currency = %code, "unknown currency, treating as USD");
                UsdRate {
                    rate: 1.0,
                    source: RateSource::Assumed,
                }
            }
        });

        self.cache.insert(&code, resolved).await;
        resolved
    }
}
