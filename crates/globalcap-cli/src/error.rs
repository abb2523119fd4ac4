use globalcap_core::{ConfigError, OutputError, PipelineError, SinkError, WarehouseError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("snapshot not persisted: {0}")]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("no snapshot stored{}", date_suffix(.date))]
    SnapshotMissing { date: Option<String> },

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Pipeline(PipelineError::Config(_)) => 2,
            Self::Pipeline(PipelineError::NoData) | Self::SnapshotMissing { .. } => 3,
            Self::Sink(_) | Self::Warehouse(_) => 4,
            Self::Output(_) | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}

fn date_suffix(date: &Option<String>) -> String {
    date.as_deref()
        .map(|date| format!(" for {date}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_failure_class() {
        assert_eq!(CliError::from(ConfigError::MissingApiKey).exit_code(), 2);
        assert_eq!(
            CliError::from(PipelineError::Config(ConfigError::MissingApiKey)).exit_code(),
            2
        );
        assert_eq!(CliError::from(PipelineError::NoData).exit_code(), 3);
        assert_eq!(CliError::from(SinkError::EmptySnapshot).exit_code(), 4);
        assert_eq!(
            CliError::from(std::io::Error::other("disk full")).exit_code(),
            10
        );
    }

    #[test]
    fn missing_snapshot_names_the_date() {
        let error = CliError::SnapshotMissing {
            date: Some(String::from("2024-06-01")),
        };
        assert_eq!(error.to_string(), "no snapshot stored for 2024-06-01");
        assert_eq!(
            CliError::SnapshotMissing { date: None }.to_string(),
            "no snapshot stored"
        );
    }
}
