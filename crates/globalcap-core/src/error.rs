use std::path::PathBuf;

use thiserror::Error;

/// Validation errors raised while building domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("currency must be a 3-letter uppercase ISO code: '{value}'")]
    InvalidCurrency { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' cannot be empty")]
    EmptyField { field: &'static str },
}

/// Fatal configuration problems. Raised before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("FMP API key is missing; set FMP_API_KEY or pass --api-key")]
    MissingApiKey,

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("invalid symbol in {origin}: {source}")]
    InvalidSymbol {
        origin: String,
        #[source]
        source: ValidationError,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Run-level failures of the collection pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no assets were collected from any source; nothing to persist")]
    NoData,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures while writing the ranked JSON artifact.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
