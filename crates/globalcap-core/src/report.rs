//! Per-run audit counters.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::Serialize;
use tracing::info;

use crate::currency::{RateSource, UsdRate};
use crate::reconcile::ReconcileMethod;

/// Why an item never became a ranked record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    BatchFailed,
    NonPositiveMarketCap,
    FundExcluded,
    InactiveOrEtf,
    QuoteFailed,
    ImplausibleMarketCap,
    RegionalAnomaly,
    NotEssentialCommodity,
    DuplicateSymbol,
    InvalidRecord,
    WorkerFailed,
}

impl SkipReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BatchFailed => "batch_failed",
            Self::NonPositiveMarketCap => "non_positive_market_cap",
            Self::FundExcluded => "fund_excluded",
            Self::InactiveOrEtf => "inactive_or_etf",
            Self::QuoteFailed => "quote_failed",
            Self::ImplausibleMarketCap => "implausible_market_cap",
            Self::RegionalAnomaly => "regional_anomaly",
            Self::NotEssentialCommodity => "not_essential_commodity",
            Self::DuplicateSymbol => "duplicate_symbol",
            Self::InvalidRecord => "invalid_record",
            Self::WorkerFailed => "worker_failed",
        }
    }
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one source (equities, commodities, crypto).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    /// Items asked for upstream.
    pub requested: usize,
    /// Items the upstream returned.
    pub received: usize,
    /// Records produced.
    pub processed: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub batches_requested: usize,
    pub batches_failed: usize,
}

impl SourceReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn skip(&mut self, reason: SkipReason) {
        self.skip_many(reason, 1);
    }

    pub fn skip_many(&mut self, reason: SkipReason, count: usize) {
        if count > 0 {
            *self.skipped.entry(reason).or_insert(0) += count;
        }
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn log_summary(&self) {
        info!(
            source = %self.source,
            requested = self.requested,
            received = self.received,
            processed = self.processed,
            skipped = self.skipped_total(),
            batches_requested = self.batches_requested,
            batches_failed = self.batches_failed,
            "source collected"
        );
    }
}

/// A reconciliation decision that did not follow the plain conversion path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationOverride {
    pub symbol: String,
    pub currency: String,
    pub batch_market_cap: f64,
    pub quote_market_cap: f64,
    pub method: ReconcileMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FxRateUsed {
    pub currency: String,
    pub rate: f64,
    pub source: RateSource,
}

impl FxRateUsed {
    pub fn from_cache(currency: String, rate: UsdRate) -> Self {
        Self {
            currency,
            rate: rate.rate,
            source: rate.source,
        }
    }
}

/// Full audit record for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub sources: Vec<SourceReport>,
    pub reconciliation_overrides: Vec<ReconciliationOverride>,
    pub fx_rates: Vec<FxRateUsed>,
    pub fx_fallback_version: String,
    pub deduplicated_listings: usize,
    pub final_count: usize,
}

impl RunReport {
    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|report| report.source == name)
    }

    pub fn log_summary(&self) {
        for source in &self.sources {
            source.log_summary();
        }
        let fallback_rates = self
            .fx_rates
            .iter()
            .filter(|rate| rate.source == RateSource::Fallback)
            .count();
        info!(
            run_id = %self.run_id,
            final_count = self.final_count,
            deduplicated = self.deduplicated_listings,
            overrides = self.reconciliation_overrides.len(),
            fx_rates = self.fx_rates.len(),
            fallback_rates,
            "run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_counters_accumulate_per_reason() {
        let mut report = SourceReport::new("equities");
        report.skip(SkipReason::QuoteFailed);
        report.skip(SkipReason::QuoteFailed);
        report.skip(SkipReason::FundExcluded);

        assert_eq!(report.skipped_for(SkipReason::QuoteFailed), 2);
        assert_eq!(report.skipped_for(SkipReason::RegionalAnomaly), 0);
        assert_eq!(report.skipped_total(), 3);
    }

    #[test]
    fn skip_reasons_serialize_as_snake_case_keys() {
        let mut report = SourceReport::new("commodities");
        report.skip(SkipReason::NotEssentialCommodity);
        let value = serde_json::to_value(&report).expect("serialize");

        assert_eq!(value["skipped"]["not_essential_commodity"], 1);
    }
}
