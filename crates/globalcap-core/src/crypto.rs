//! Reader for the crypto snapshot written by the external producer.
//!
//! The file is a JSON array in the artifact schema. Entries that do not
//! validate are counted and dropped; an unreadable file yields no records.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::report::{SkipReason, SourceReport};
use crate::{AssetDraft, AssetRecord, AssetType};

pub const CRYPTO_SOURCE: &str = "crypto";

#[derive(Debug, Clone)]
pub struct CryptoSnapshotReader {
    path: PathBuf,
}

impl CryptoSnapshotReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn collect(&self) -> (Vec<AssetRecord>, SourceReport) {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(path = %self.path.display(), error = %error, "crypto snapshot unreadable");
                return failed_source();
            }
        };

        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(entries) => parse_crypto_entries(entries),
            Err(error) => {
                warn!(path = %self.path.display(), error = %error, "crypto snapshot is not a JSON array");
                failed_source()
            }
        }
    }
}

fn failed_source() -> (Vec<AssetRecord>, SourceReport) {
    let mut report = SourceReport::new(CRYPTO_SOURCE);
    report.batches_requested = 1;
    report.batches_failed = 1;
    report.skip(SkipReason::BatchFailed);
    (Vec::new(), report)
}

/// Validate producer entries. A missing `asset_type` means crypto.
pub fn parse_crypto_entries(entries: Vec<Value>) -> (Vec<AssetRecord>, SourceReport) {
    let mut report = SourceReport::new(CRYPTO_SOURCE);
    report.batches_requested = 1;
    report.requested = entries.len();
    report.received = entries.len();

    let mut records = Vec::with_capacity(entries.len());
    for (index, mut entry) in entries.into_iter().enumerate() {
        if let Value::Object(fields) = &mut entry {
            fields
                .entry("asset_type")
                .or_insert_with(|| Value::String(AssetType::Crypto.as_str().to_owned()));
        }

        let parsed = serde_json::from_value::<AssetDraft>(entry)
            .map_err(|error| error.to_string())
            .and_then(|draft| AssetRecord::new(draft).map_err(|error| error.to_string()));
        match parsed {
            Ok(record) => records.push(record),
            Err(error) => {
                debug!(index, error = %error, "invalid crypto entry");
                report.skip(SkipReason::InvalidRecord);
            }
        }
    }

    report.processed = records.len();
    (records, report)
}
