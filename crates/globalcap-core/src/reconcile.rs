//! Market-cap reconciliation between the batch and quote endpoints.
//!
//! The batch endpoint reports non-US caps in the listing's native
//! currency, so they are multiplied by the USD rate. Some listings however
//! come back from the quote endpoint with a figure that is already in USD
//! and an order of magnitude above the batch one; for those the quote
//! figure is taken as-is. Every such override is logged and reported.

use serde::Serialize;

use crate::currency::venue_for_symbol;
use crate::report::SkipReason;

/// Thresholds for reconciliation and the sanity filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationPolicy {
    /// Quote cap must exceed `ratio × batch cap` to be assumed USD.
    pub override_ratio: f64,
    /// Quote cap must also exceed this USD floor.
    pub override_floor_usd: f64,
    pub implausible_cap_usd: f64,
    pub regional_anomaly_cap_usd: f64,
    pub regional_anomaly_suffixes: Vec<String>,
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        Self {
            override_ratio: 10.0,
            override_floor_usd: 100e9,
            implausible_cap_usd: 10e12,
            regional_anomaly_cap_usd: 500e9,
            regional_anomaly_suffixes: ["JK", "BA", "SN", "IS", "ME", "EG", "VN"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMethod {
    /// USD listing; batch figure used directly.
    Native,
    /// Batch figure multiplied by the USD rate.
    ConvertedFromBatch,
    /// Quote figure assumed to be USD already.
    QuoteAssumedUsd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciled {
    pub market_cap_usd: f64,
    pub method: ReconcileMethod,
}

pub fn reconcile(
    policy: &ReconciliationPolicy,
    currency: &str,
    batch_cap: f64,
    quote_cap: Option<f64>,
    usd_rate: f64,
) -> Reconciled {
    if currency.eq_ignore_ascii_case("USD") {
        return Reconciled {
            market_cap_usd: batch_cap,
            method: ReconcileMethod::Native,
        };
    }

    if let Some(quote_cap) = quote_cap.filter(|value| value.is_finite()) {
        if quote_cap > policy.override_ratio * batch_cap && quote_cap > policy.override_floor_usd {
            return Reconciled {
                market_cap_usd: quote_cap,
                method: ReconcileMethod::QuoteAssumedUsd,
            };
        }
    }

    Reconciled {
        market_cap_usd: batch_cap * usd_rate,
        method: ReconcileMethod::ConvertedFromBatch,
    }
}

/// Drop figures that cannot be right.
pub fn sanity_check(
    policy: &ReconciliationPolicy,
    symbol: &str,
    market_cap_usd: f64,
) -> Result<(), SkipReason> {
    if !market_cap_usd.is_finite() || market_cap_usd <= 0.0 {
        return Err(SkipReason::NonPositiveMarketCap);
    }
    if market_cap_usd > policy.implausible_cap_usd {
        return Err(SkipReason::ImplausibleMarketCap);
    }

    let anomalous_venue = venue_for_symbol(symbol).is_some_and(|venue| {
        policy
            .regional_anomaly_suffixes
            .iter()
            .any(|suffix| suffix.eq_ignore_ascii_case(venue.suffix))
    });
    if anomalous_venue && market_cap_usd > policy.regional_anomaly_cap_usd {
        return Err(SkipReason::RegionalAnomaly);
    }

    Ok(())
}
