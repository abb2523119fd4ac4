//! Upstream provider adapters.

mod fmp;

pub use fmp::FmpAdapter;
