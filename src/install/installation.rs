//! Version-level installation
//!
//! Turns an [`Ensure`] directive into a concrete archive URL for the current
//! platform and hands the work to [`TarballResource`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use url::Url;

use crate::config::{DEFAULT_INDEX_URL, DEFAULT_MODE, DEFAULT_SOURCE_PREFIX};
use crate::install::Outcome;
use crate::install::error::InstallError;
use crate::install::fetch::Fetcher;
use crate::install::platform::Platform;
use crate::install::tarball::{TarballEnsure, TarballResource};
use crate::version::cache::LatestVersionCache;
use crate::version::index::ReleaseIndex;
use crate::version::semver::{CompareResult, compare_versions};
use crate::version::{Ensure, GoVersion};

/// A Go toolchain installed at `path`
#[derive(Debug, Clone)]
pub struct Installation {
    pub path: PathBuf,
    pub ensure: Ensure,
    pub source_prefix: String,
    pub index_url: String,
    pub platform: Platform,
    pub state_file: Option<PathBuf>,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: u32,
}

impl Installation {
    pub fn new(path: impl Into<PathBuf>, ensure: Ensure, platform: Platform) -> Self {
        Self {
            path: path.into(),
            ensure,
            source_prefix: DEFAULT_SOURCE_PREFIX.to_string(),
            index_url: DEFAULT_INDEX_URL.to_string(),
            platform,
            state_file: None,
            owner: None,
            group: None,
            mode: DEFAULT_MODE,
        }
    }

    pub async fn apply<I: ReleaseIndex>(
        &self,
        cache: &LatestVersionCache<I>,
        fetcher: &dyn Fetcher,
    ) -> Result<Outcome, InstallError> {
        let resource = self.resolve(cache).await?;

        // Informational only; read failures are not fatal
        if let (TarballEnsure::Present, Some(source)) = (resource.ensure, &resource.source) {
            match installed_version(&self.path) {
                Ok(Some(installed)) => {
                    debug!("{} currently holds Go {}", self.path.display(), installed);
                    log_transition(&installed, source);
                }
                Ok(None) => {}
                Err(e) => warn!("Cannot tell which Go is installed: {}", e),
            }
        }

        resource.apply(fetcher).await
    }

    /// Maps the directive onto an archive-level resource
    async fn resolve<I: ReleaseIndex>(
        &self,
        cache: &LatestVersionCache<I>,
    ) -> Result<TarballResource, InstallError> {
        let (ensure, source) = match &self.ensure {
            Ensure::Absent => (TarballEnsure::Absent, None),
            // An existing tree of any version satisfies `present`
            Ensure::Present if self.path.exists() => (TarballEnsure::AnyVersion, None),
            Ensure::Present => {
                let version = cache.latest(&self.index_url).await?;
                (TarballEnsure::AnyVersion, Some(self.archive_url(&version)?))
            }
            Ensure::Latest => {
                let version = cache.latest(&self.index_url).await?;
                (TarballEnsure::Present, Some(self.archive_url(&version)?))
            }
            Ensure::Version(version) => {
                if version.is_prerelease() {
                    info!("Go {} is a release candidate", version);
                }
                (TarballEnsure::Present, Some(self.archive_url(version)?))
            }
        };

        Ok(TarballResource {
            path: self.path.clone(),
            ensure,
            source,
            state_file: self.state_file.clone(),
            owner: self.owner.clone(),
            group: self.group.clone(),
            mode: self.mode,
        })
    }

    fn archive_url(&self, version: &GoVersion) -> Result<Url, InstallError> {
        self.platform.download_url(&self.source_prefix, version)
    }
}

/// Reads the version recorded in the tree's `VERSION` file.
///
/// Returns `None` when there is no installation or the file does not hold a
/// recognizable version.
pub fn installed_version(path: &Path) -> Result<Option<GoVersion>, InstallError> {
    let version_file = path.join("VERSION");
    let content = match fs::read_to_string(&version_file) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(InstallError::io("Failed to read", version_file)(e)),
    };

    let first_line = content.lines().next().unwrap_or_default().trim();
    let raw = first_line.strip_prefix("go").unwrap_or(first_line);
    Ok(GoVersion::parse(raw).ok())
}

fn log_transition(installed: &GoVersion, source: &Url) {
    // go1.19.1.linux-amd64.tar.gz
    let target = source
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| name.strip_prefix("go"))
        .and_then(|name| name.split_once(".tar.gz").map(|(stem, _)| stem))
        .and_then(|stem| stem.rsplit_once('.').map(|(version, _)| version));

    let Some(target) = target else {
        return;
    };

    match compare_versions(installed.as_str(), target) {
        CompareResult::Latest => {}
        CompareResult::Outdated => info!("Upgrading Go {} to {}", installed, target),
        CompareResult::Newer => info!("Downgrading Go {} to {}", installed, target),
        CompareResult::Invalid => warn!("Cannot compare Go {} with {}", installed, target),
    }
}
