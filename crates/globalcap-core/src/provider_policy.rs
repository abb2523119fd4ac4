use std::time::Duration;

use crate::retry::RetryConfig;

/// Upstream call budget: request quota, timeout and retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub provider: &'static str,
    pub base_url: String,
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl ProviderPolicy {
    /// Financial Modeling Prep defaults for a paid plan.
    pub fn fmp_default() -> Self {
        Self {
            provider: "fmp",
            base_url: String::from("https://financialmodelingprep.com/api"),
            quota_window: Duration::from_secs(60),
            quota_limit: 3_000,
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::exponential(2),
        }
    }

    pub fn with_requests_per_minute(mut self, limit: u32) -> Self {
        self.quota_window = Duration::from_secs(60);
        self.quota_limit = limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }
}
