//! Cross-listing deduplication.
//!
//! A company listed in several places (home market, New York ADR, OTC
//! line) must appear once. Records are grouped by normalized company name
//! and the best listing of each group survives.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::currency::venue_for_symbol;
use crate::AssetRecord;

const MAJOR_US_EXCHANGES: &[&str] = &["NYSE", "NASDAQ", "AMEX"];
const OTC_EXCHANGES: &[&str] = &["OTC", "PNK"];

/// Trailing tokens that do not distinguish one company from another.
const NAME_SUFFIXES: &[&str] = &[
    "INC",
    "INCORPORATED",
    "CORP",
    "CORPORATION",
    "CO",
    "COMPANY",
    "LTD",
    "LIMITED",
    "PLC",
    "AG",
    "SA",
    "NV",
    "SE",
    "ASA",
    "AB",
    "SPA",
    "HOLDINGS",
    "HOLDING",
    "GROUP",
    "ADR",
];

fn exchange_matches(exchange: &str, names: &[&str]) -> bool {
    let exchange = exchange.trim().to_ascii_uppercase();
    names.iter().any(|name| exchange.starts_with(name))
}

/// Listing preference, lower is better.
///
/// | Priority | Listing |
/// |----------|---------|
/// | 0 | Home-region primary listing |
/// | 1 | Unsuffixed NYSE/NASDAQ/AMEX ticker |
/// | 2 | Depositary receipt (5-letter ticker ending in `Y`) |
/// | 3 | Over-the-counter |
/// | 4 | Anything else |
pub fn listing_priority(symbol: &str, exchange: &str, country: &str) -> u8 {
    let symbol = symbol.trim().to_ascii_uppercase();
    let country = country.trim();

    let venue = venue_for_symbol(&symbol);
    if venue.is_some_and(|venue| venue.country.eq_ignore_ascii_case(country)) {
        return 0;
    }

    // share classes such as BRK.B carry a dot but no venue suffix
    let unsuffixed = venue.is_none();
    let major_us = unsuffixed && exchange_matches(exchange, MAJOR_US_EXCHANGES);
    if major_us && country.eq_ignore_ascii_case("US") {
        return 0;
    }
    if major_us {
        return 1;
    }

    let five_letters = symbol.len() == 5 && symbol.chars().all(|ch| ch.is_ascii_alphabetic());
    if five_letters && symbol.ends_with('Y') {
        return 2;
    }
    if exchange_matches(exchange, OTC_EXCHANGES) || (five_letters && symbol.ends_with('F')) {
        return 3;
    }
    4
}

fn priority_of(record: &AssetRecord) -> u8 {
    listing_priority(
        record.ticker().as_str(),
        record.primary_exchange(),
        record.country(),
    )
}

/// Whether `candidate` should take `incumbent`'s place.
///
/// Better priority wins, then larger market cap, then the smaller ticker,
/// which makes the choice independent of input order.
pub fn should_replace(candidate: &AssetRecord, incumbent: &AssetRecord) -> bool {
    let by_priority = priority_of(candidate).cmp(&priority_of(incumbent));
    let by_market_cap = incumbent
        .market_cap_usd()
        .total_cmp(&candidate.market_cap_usd());
    let by_ticker = candidate.ticker().cmp(incumbent.ticker());

    by_priority.then(by_market_cap).then(by_ticker) == Ordering::Less
}

/// Grouping key: uppercase alphanumeric words with corporate suffixes and
/// share-class markers removed. "Alphabet Inc. Class A" becomes "ALPHABET".
pub fn normalize_company_name(name: &str) -> String {
    let upper = name.to_ascii_uppercase();
    let mut tokens: Vec<&str> = upper
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect();

    loop {
        let len = tokens.len();
        if len >= 2 && tokens[len - 2] == "CLASS" && tokens[len - 1].len() == 1 {
            tokens.truncate(len - 2);
        } else if len >= 2 && NAME_SUFFIXES.contains(&tokens[len - 1]) {
            tokens.truncate(len - 1);
        } else {
            break;
        }
    }

    tokens.join(" ")
}

#[derive(Debug, Clone)]
pub struct Deduplicated {
    /// Ordered by normalized company name.
    pub records: Vec<AssetRecord>,
    /// Listings dropped because a better one of the same company existed.
    pub collapsed: usize,
}

/// Keep the best listing per company. Idempotent and permutation-invariant.
pub fn deduplicate(records: Vec<AssetRecord>) -> Deduplicated {
    let total = records.len();
    let mut best: BTreeMap<String, AssetRecord> = BTreeMap::new();

    for record in records {
        let mut key = normalize_company_name(record.name());
        if key.is_empty() {
            key = record.ticker().to_string();
        }

        let replace = best
            .get(&key)
            .map_or(true, |incumbent| should_replace(&record, incumbent));
        if replace {
            best.insert(key, record);
        }
    }

    let records: Vec<AssetRecord> = best.into_values().collect();
    Deduplicated {
        collapsed: total - records.len(),
        records,
    }
}
