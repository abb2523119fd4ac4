//! Global ranking and top-N selection.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::{AssetRecord, RankedAsset};

pub const DEFAULT_TOP_N: usize = 500;

/// Descending market cap, ties broken by ticker ascending.
pub fn compare_by_market_cap(left: &AssetRecord, right: &AssetRecord) -> Ordering {
    right
        .market_cap_usd()
        .total_cmp(&left.market_cap_usd())
        .then_with(|| left.ticker().cmp(right.ticker()))
}

/// Merge every source, order globally, keep one record per ticker and
/// number the first `top_n` from 1.
pub fn rank_assets<I>(sources: I, top_n: usize) -> Vec<RankedAsset>
where
    I: IntoIterator<Item = AssetRecord>,
{
    let mut merged: Vec<AssetRecord> = sources.into_iter().collect();
    merged.sort_by(compare_by_market_cap);

    let mut seen = HashSet::with_capacity(merged.len());
    merged
        .into_iter()
        .filter(|record| seen.insert(record.ticker().clone()))
        .take(top_n)
        .zip(1_u32..)
        .map(|(asset, rank)| RankedAsset { rank, asset })
        .collect()
}
