//! metadata.json version bump
//!
//! The version is replaced textually so the rest of the file keeps its
//! formatting; the result is then parsed to read `source` and `version`.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::info;

use crate::release::error::ReleaseError;

static VERSION_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"("version"\s*:\s*)"[0-9.]+""#).expect("valid regex"));

/// The fields of metadata.json the release needs
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    /// Repository URL, e.g. `https://github.com/owner/module`
    pub source: String,
    pub version: String,
}

/// Replaces the first `"version": "X.Y.Z"` value; `None` if there is none
pub fn set_version(content: &str, version: &str) -> Option<String> {
    if !VERSION_FIELD.is_match(content) {
        return None;
    }

    let updated = VERSION_FIELD.replacen(content, 1, |caps: &Captures| {
        format!("{}\"{}\"", &caps[1], version)
    });
    Some(updated.into_owned())
}

pub fn read(path: &Path) -> Result<Metadata, ReleaseError> {
    let content = fs::read_to_string(path).map_err(ReleaseError::io(path))?;
    serde_json::from_str(&content).map_err(|source| ReleaseError::Metadata {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `version` into the metadata file and returns the parsed result
pub fn update(path: &Path, version: &str) -> Result<Metadata, ReleaseError> {
    info!("Updating {} with version {}", path.display(), version);

    let content = fs::read_to_string(path).map_err(ReleaseError::io(path))?;
    let updated = set_version(&content, version).ok_or_else(|| ReleaseError::NoMetadataVersion {
        path: path.to_path_buf(),
    })?;
    fs::write(path, updated).map_err(ReleaseError::io(path))?;

    read(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    const METADATA: &str = r#"{
  "name": "danielparks-golang",
  "version": "1.0.0",
  "author": "Daniel Parks",
  "source": "https://github.com/danielparks/puppet-golang",
  "dependencies": [
    { "name": "puppetlabs/stdlib", "version_requirement": ">= 4.13.1 < 9.0.0" }
  ]
}
"#;

    #[rstest]
    #[case(r#"{"version":"1.0.0"}"#, r#"{"version":"1.1.0"}"#)]
    #[case(r#"{"version" :  "0.9"}"#, r#"{"version" :  "1.1.0"}"#)]
    #[case(
        r#"{"version": "1.0.0", "x": {"version": "2.0.0"}}"#,
        r#"{"version": "1.1.0", "x": {"version": "2.0.0"}}"#
    )]
    fn set_version_replaces_first_field(#[case] content: &str, #[case] expected: &str) {
        assert_eq!(set_version(content, "1.1.0").as_deref(), Some(expected));
    }

    #[rstest]
    #[case(r#"{"name": "x"}"#)]
    #[case(r#"{"version": "1.0.0-rc1"}"#)]
    fn set_version_without_plain_version_field(#[case] content: &str) {
        assert_eq!(set_version(content, "1.1.0"), None);
    }

    #[test]
    fn set_version_keeps_dollar_signs_literal() {
        assert_eq!(
            set_version(r#"{"version": "1.0.0"}"#, "$1").as_deref(),
            Some(r#"{"version": "$1"}"#)
        );
    }

    #[test]
    fn update_rewrites_file_and_returns_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");
        fs::write(&path, METADATA).unwrap();

        let metadata = update(&path, "1.1.0").unwrap();

        assert_eq!(
            metadata,
            Metadata {
                source: "https://github.com/danielparks/puppet-golang".to_string(),
                version: "1.1.0".to_string(),
            }
        );
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            METADATA.replace("\"1.0.0\"", "\"1.1.0\"")
        );
    }

    #[test]
    fn update_reports_missing_version_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metadata.json");
        fs::write(&path, r#"{"source": "https://example.com"}"#).unwrap();

        assert!(matches!(
            update(&path, "1.1.0"),
            Err(ReleaseError::NoMetadataVersion { .. })
        ));
    }
}
