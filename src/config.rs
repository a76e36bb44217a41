use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::release::error::ReleaseError;

// =============================================================================
// Installer constants
// =============================================================================

/// Release index listing Go versions, newest first
pub const DEFAULT_INDEX_URL: &str = "https://go.dev/dl/?mode=json";

/// Prefix Go archives are downloaded from
pub const DEFAULT_SOURCE_PREFIX: &str = "https://go.dev/dl";

/// How long a resolved latest version is reused (10 minutes)
pub const LATEST_VERSION_TTL: Duration = Duration::from_secs(600);

/// Timeout for archive downloads in seconds (5 minutes)
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Default installation directory for `setup`
pub const DEFAULT_INSTALL_PATH: &str = "/usr/local/go";

/// Default directory binaries are linked into for `setup`
pub const DEFAULT_LINK_DIR: &str = "/usr/local/bin";

/// Default mode of the installation directory
pub const DEFAULT_MODE: u32 = 0o755;

/// Mode of the sentinel file recording the source URL
pub const STATE_FILE_MODE: u32 = 0o444;

// =============================================================================
// Release constants
// =============================================================================

/// Environment variable holding the Forge API token
pub const FORGE_TOKEN_ENV: &str = "PDK_FORGE_TOKEN";

/// Optional per-repository release configuration file
pub const RELEASE_CONFIG_FILE: &str = ".release.toml";

/// Release configuration, read from `.release.toml` when present
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReleaseConfig {
    pub changelog: PathBuf,
    pub metadata: PathBuf,
    /// Heading that marks the in-development changelog section
    pub dev_header: String,
    pub remote: String,
    pub branch: String,
    /// Glob for the built artifact; `{version}` is substituted
    pub artifact: String,
    /// Directory whose presence enables the acceptance step
    pub acceptance_dir: PathBuf,
    pub commands: CommandsConfig,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            changelog: PathBuf::from("CHANGELOG.md"),
            metadata: PathBuf::from("metadata.json"),
            dev_header: "## main branch".to_string(),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            artifact: "pkg/*-{version}.tar.gz".to_string(),
            acceptance_dir: PathBuf::from("spec/acceptance"),
            commands: CommandsConfig::default(),
        }
    }
}

/// External commands run by the release pipeline, each as argv
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct CommandsConfig {
    pub reference: Vec<String>,
    pub template_update: Vec<String>,
    pub validate: Vec<String>,
    pub unit: Vec<String>,
    pub acceptance: Vec<String>,
    pub build: Vec<String>,
    pub publish: Vec<String>,
}

fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            reference: argv(&[
                "pdk", "bundle", "exec", "puppet", "strings", "generate", "--format", "markdown",
            ]),
            template_update: argv(&["pdk", "update", "--force"]),
            validate: argv(&["pdk", "validate"]),
            unit: argv(&["pdk", "test", "unit"]),
            acceptance: argv(&["./test.sh", "init", "run", "destroy"]),
            build: argv(&["pdk", "build", "--force"]),
            publish: argv(&["pdk", "release", "publish"]),
        }
    }
}

impl ReleaseConfig {
    /// Loads `.release.toml` from `repo`, falling back to defaults when absent
    pub fn load(repo: &Path) -> Result<Self, ReleaseError> {
        let path = repo.join(RELEASE_CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ReleaseError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ReleaseError::Config { path, source })
    }

    /// Artifact glob with the version filled in
    pub fn artifact_pattern(&self, version: &str) -> String {
        self.artifact.replace("{version}", version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn release_config_from_partial_file_uses_defaults_for_missing_fields() {
        let result = toml::from_str::<ReleaseConfig>(
            r#"
            branch = "trunk"

            [commands]
            unit = ["cargo", "test"]
            "#,
        )
        .unwrap();

        assert_eq!(result.branch, "trunk");
        assert_eq!(result.commands.unit, vec!["cargo", "test"]);
        assert_eq!(result.commands.validate, vec!["pdk", "validate"]);
        assert_eq!(result.changelog, PathBuf::from("CHANGELOG.md"));
    }

    #[test]
    fn load_without_config_file_returns_defaults() {
        let dir = TempDir::new().unwrap();

        let result = ReleaseConfig::load(dir.path()).unwrap();

        assert_eq!(result, ReleaseConfig::default());
    }

    #[test]
    fn load_reads_config_file_from_repo() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(RELEASE_CONFIG_FILE),
            "dev-header = \"## Unreleased\"\nremote = \"upstream\"\n",
        )
        .unwrap();

        let result = ReleaseConfig::load(dir.path()).unwrap();

        assert_eq!(result.dev_header, "## Unreleased");
        assert_eq!(result.remote, "upstream");
        assert_eq!(result.branch, "main");
    }

    #[test]
    fn load_reports_invalid_config_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(RELEASE_CONFIG_FILE), "branch = [").unwrap();

        let result = ReleaseConfig::load(dir.path());

        assert!(matches!(result, Err(ReleaseError::Config { .. })));
    }

    #[test]
    fn artifact_pattern_substitutes_version() {
        let config = ReleaseConfig::default();

        assert_eq!(config.artifact_pattern("1.2.0"), "pkg/*-1.2.0.tar.gz");
    }
}
