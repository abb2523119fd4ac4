//! Ranked JSON artifact.

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::OutputError;
use crate::RankedAsset;

pub const DEFAULT_OUTPUT_PATH: &str = "global_assets.json";

/// Pretty-printed JSON array, two-space indent, no HTML escaping.
pub fn to_pretty_json(assets: &[RankedAsset]) -> Result<String, OutputError> {
    Ok(serde_json::to_string_pretty(assets)?)
}

/// Write the artifact to `path`, replacing any previous file.
///
/// The JSON is staged in a sibling temp file and renamed into place, so
/// `path` holds either the old artifact or the complete new one.
pub fn write_ranked_json(path: &Path, assets: &[RankedAsset]) -> Result<(), OutputError> {
    let io_error = |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent).map_err(io_error)?;
            parent
        }
        None => Path::new("."),
    };

    let staged = NamedTempFile::new_in(parent).map_err(io_error)?;
    {
        let mut writer = BufWriter::new(staged.as_file());
        serde_json::to_writer_pretty(&mut writer, assets)?;
        writer.write_all(b"\n").map_err(io_error)?;
        writer.flush().map_err(io_error)?;
    }
    staged.as_file().sync_all().map_err(io_error)?;
    staged.persist(path).map_err(|error| io_error(error.error))?;
    Ok(())
}

/// Human-readable dollar figure: `3.42T`, `38.40B`, `512.00M`.
pub fn format_large_number(value: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];

    if !value.is_finite() {
        return String::from("n/a");
    }
    let magnitude = value.abs();
    for (scale, unit) in UNITS {
        if magnitude >= scale {
            return format!("{:.2}{unit}", value / scale);
        }
    }
    format!("{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;

    fn ranked() -> Vec<RankedAsset> {
        vec![RankedAsset {
            rank: 1,
            asset: record("ACME", "Acme <Holdings> & Sons", 50e9),
        }]
    }

    #[test]
    fn artifact_is_flat_and_unescaped() {
        let json = to_pretty_json(&ranked()).expect("serialize");

        assert!(json.starts_with("[\n  {\n    \"rank\": 1,"));
        assert!(json.contains("\"market_cap\": 50000000000.0"));
        assert!(json.contains("Acme <Holdings> & Sons"));
        assert!(!json.contains("\"asset\""));
    }

    #[test]
    fn writes_file_with_trailing_newline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("global_assets.json");

        write_ranked_json(&path, &ranked()).expect("write");
        let written = std::fs::read_to_string(&path).expect("read back");

        assert!(written.ends_with("]\n"));
        let parsed: serde_json::Value = serde_json::from_str(&written).expect("valid json");
        assert_eq!(parsed[0]["ticker"], "ACME");
    }

    #[test]
    fn rewriting_replaces_the_artifact_without_leftovers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("global_assets.json");
        std::fs::write(&path, "stale").expect("seed old artifact");

        write_ranked_json(&path, &ranked()).expect("write");

        let written = std::fs::read_to_string(&path).expect("read back");
        assert!(written.starts_with('['));
        let entries = std::fs::read_dir(dir.path()).expect("list").count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        // a non-empty directory cannot be replaced by a file
        let path = dir.path().join("global_assets.json");
        std::fs::create_dir(&path).expect("blocking dir");
        std::fs::write(path.join("keep"), "x").expect("fill dir");

        let result = write_ranked_json(&path, &ranked());

        assert!(matches!(result, Err(OutputError::Io { .. })));
        assert!(path.join("keep").exists());
        let entries = std::fs::read_dir(dir.path()).expect("list").count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn large_numbers_use_suffixes() {
        assert_eq!(format_large_number(3.42e12), "3.42T");
        assert_eq!(format_large_number(38.4e9), "38.40B");
        assert_eq!(format_large_number(512e6), "512.00M");
        assert_eq!(format_large_number(1_500.0), "1.50K");
        assert_eq!(format_large_number(12.0), "12.00");
    }
}
