//! Validated run configuration.

use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::currency::FallbackRates;
use crate::equities::FetchSettings;
use crate::error::ConfigError;
use crate::provider_policy::ProviderPolicy;
use crate::ranking::DEFAULT_TOP_N;
use crate::reconcile::ReconciliationPolicy;
use crate::retry::RetryConfig;
use crate::universe::{CuratedUniverse, ScreenerUniverse, SymbolUniverse, DEFAULT_CURATED_SYMBOLS};
use crate::Symbol;

pub const DEFAULT_BATCH_SIZE: usize = 75;
pub const MAX_BATCH_SIZE: usize = 500;
pub const DEFAULT_SCREENER_MIN_MARKET_CAP: f64 = 1e9;
pub const DEFAULT_SCREENER_LIMIT: usize = 1_000;

/// Markets queried when the screener universe is selected.
pub const DEFAULT_SCREENER_COUNTRIES: &[&str] = &[
    "US", "CN", "HK", "JP", "IN", "GB", "FR", "DE", "CH", "NL", "CA", "AU", "KR", "TW", "SA",
    "BR", "SE", "DK", "IT", "ES", "SG", "ID", "MX", "ZA",
];

/// Where equity candidates come from.
#[derive(Debug, Clone, PartialEq)]
pub enum UniverseStrategy {
    Curated {
        symbols: Vec<Symbol>,
    },
    Screener {
        countries: Vec<String>,
        min_market_cap: f64,
        limit: usize,
    },
}

impl Default for UniverseStrategy {
    fn default() -> Self {
        Self::curated_default()
    }
}

impl UniverseStrategy {
    pub fn curated_default() -> Self {
        Self::Curated {
            symbols: default_curated_symbols(),
        }
    }

    pub fn screener_default() -> Self {
        Self::Screener {
            countries: DEFAULT_SCREENER_COUNTRIES
                .iter()
                .map(|country| (*country).to_owned())
                .collect(),
            min_market_cap: DEFAULT_SCREENER_MIN_MARKET_CAP,
            limit: DEFAULT_SCREENER_LIMIT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Curated { .. } => "curated",
            Self::Screener { .. } => "screener",
        }
    }

    pub fn build(&self, batch_size: usize) -> Arc<dyn SymbolUniverse> {
        match self {
            Self::Curated { symbols } => Arc::new(CuratedUniverse::new(symbols.clone(), batch_size)),
            Self::Screener {
                countries,
                min_market_cap,
                limit,
            } => Arc::new(ScreenerUniverse::new(countries.clone(), *min_market_cap, *limit)),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Curated { symbols } if symbols.is_empty() => {
                Err(ConfigError::invalid("symbols", "curated universe is empty"))
            }
            Self::Curated { .. } => Ok(()),
            Self::Screener {
                countries,
                min_market_cap,
                limit,
            } => {
                if countries.iter().all(|country| country.trim().is_empty()) {
                    return Err(ConfigError::invalid("countries", "at least one country is required"));
                }
                if !min_market_cap.is_finite() || *min_market_cap < 0.0 {
                    return Err(ConfigError::invalid(
                        "min_market_cap",
                        format!("must be a non-negative number, got {min_market_cap}"),
                    ));
                }
                if *limit == 0 {
                    return Err(ConfigError::invalid("screener_limit", "must be positive"));
                }
                Ok(())
            }
        }
    }
}

/// Everything one pipeline run needs. Build with [`PipelineConfig::new`],
/// adjust fields, then call [`PipelineConfig::validate`].
#[derive(Clone)]
pub struct PipelineConfig {
    pub api_key: String,
    pub universe: UniverseStrategy,
    pub top_n: usize,
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub batch_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub requests_per_minute: u32,
    pub max_retries: u32,
    pub fetch_profiles: bool,
    pub fx_fallback: FallbackRates,
    pub crypto_input: Option<PathBuf>,
    pub reconciliation: ReconciliationPolicy,
}

impl Debug for PipelineConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("api_key", &"<redacted>")
            .field("universe", &self.universe.name())
            .field("top_n", &self.top_n)
            .field("batch_size", &self.batch_size)
            .field("max_concurrency", &self.max_concurrency)
            .field("batch_delay_ms", &self.batch_delay_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("max_retries", &self.max_retries)
            .field("fetch_profiles", &self.fetch_profiles)
            .field("fx_fallback", &self.fx_fallback.version)
            .field("crypto_input", &self.crypto_input)
            .field("reconciliation", &self.reconciliation)
            .finish()
    }
}

impl PipelineConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            universe: UniverseStrategy::default(),
            top_n: DEFAULT_TOP_N,
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrency: 10,
            batch_delay_ms: 50,
            request_timeout_ms: 30_000,
            requests_per_minute: 3_000,
            max_retries: 2,
            fetch_profiles: true,
            fx_fallback: FallbackRates::builtin(),
            crypto_input: None,
            reconciliation: ReconciliationPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.top_n == 0 {
            return Err(ConfigError::invalid("top_n", "must be positive"));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::invalid(
                "batch_size",
                format!("must be between 1 and {MAX_BATCH_SIZE}, got {}", self.batch_size),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::invalid("max_concurrency", "must be positive"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::invalid("request_timeout_ms", "must be positive"));
        }
        if self.requests_per_minute == 0 {
            return Err(ConfigError::invalid("requests_per_minute", "must be positive"));
        }

        self.universe.validate()?;
        self.fx_fallback.validate()?;
        validate_reconciliation(&self.reconciliation)
    }

    pub fn provider_policy(&self) -> ProviderPolicy {
        ProviderPolicy::fmp_default()
            .with_requests_per_minute(self.requests_per_minute)
            .with_timeout(Duration::from_millis(self.request_timeout_ms))
            .with_retry(RetryConfig::exponential(self.max_retries))
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            max_concurrency: self.max_concurrency,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            fetch_profiles: self.fetch_profiles,
        }
    }
}

fn validate_reconciliation(policy: &ReconciliationPolicy) -> Result<(), ConfigError> {
    let thresholds = [
        ("override_ratio", policy.override_ratio),
        ("override_floor_usd", policy.override_floor_usd),
        ("implausible_cap_usd", policy.implausible_cap_usd),
        ("regional_anomaly_cap_usd", policy.regional_anomaly_cap_usd),
    ];
    for (field, value) in thresholds {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::invalid(field, format!("must be positive, got {value}")));
        }
    }
    Ok(())
}

/// Built-in curated list as validated symbols.
pub fn default_curated_symbols() -> Vec<Symbol> {
    DEFAULT_CURATED_SYMBOLS
        .iter()
        .filter_map(|value| Symbol::parse(value).ok())
        .collect()
}

/// One symbol per line. Blank lines and `#` comments are ignored.
pub fn load_symbol_file(path: &Path) -> Result<Vec<Symbol>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut symbols = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let symbol = Symbol::parse(line).map_err(|source| ConfigError::InvalidSymbol {
            origin: format!("{}:{}", path.display(), index + 1),
            source,
        })?;
        symbols.push(symbol);
    }

    if symbols.is_empty() {
        return Err(ConfigError::invalid("symbols", format!("{} lists no symbols", path.display())));
    }
    Ok(symbols)
}
