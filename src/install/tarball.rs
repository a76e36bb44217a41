//! Archive-level installation keyed by source URL
//!
//! A [`TarballResource`] describes one directory that should (or should not)
//! contain the extracted contents of a Go archive. The decision of what to do
//! is a pure function of the desired state and what is on disk, see [`plan`].

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info};
use url::Url;

use crate::config::{DEFAULT_MODE, STATE_FILE_MODE};
use crate::install::Outcome;
use crate::install::error::InstallError;
use crate::install::fetch::{Fetcher, extract_archive};
use crate::install::ownership::{Ownership, normalize_file, normalize_tree};
use crate::install::state_file::state_file;
use crate::version::error::VersionError;

/// Desired state of an archive installation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarballEnsure {
    /// Installed from exactly the configured source
    Present,
    /// Any existing installation is accepted
    AnyVersion,
    /// Installation and sentinel must not exist
    Absent,
}

impl FromStr for TarballEnsure {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(TarballEnsure::Present),
            "any_version" => Ok(TarballEnsure::AnyVersion),
            "absent" => Ok(TarballEnsure::Absent),
            other => Err(VersionError::InvalidEnsure(other.to_string())),
        }
    }
}

impl fmt::Display for TarballEnsure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TarballEnsure::Present => "present",
            TarballEnsure::AnyVersion => "any_version",
            TarballEnsure::Absent => "absent",
        })
    }
}

/// Snapshot of an installation on disk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnDisk {
    pub dir_exists: bool,
    /// Source URL recorded in the sentinel file, if there is one
    pub recorded_source: Option<String>,
}

impl OnDisk {
    pub fn inspect(path: &Path, state_file: &Path) -> Result<Self, InstallError> {
        let dir_exists = match fs::symlink_metadata(path) {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(InstallError::io("Failed to inspect", path)(e)),
        };

        let recorded_source = match fs::read_to_string(state_file) {
            Ok(content) => Some(
                content
                    .strip_suffix('\n')
                    .unwrap_or(&content)
                    .to_string(),
            ),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(InstallError::io("Failed to read state file", state_file)(e)),
        };

        Ok(Self {
            dir_exists,
            recorded_source,
        })
    }
}

/// What has to happen to reach the desired state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Absent and nothing on disk
    Nothing,
    /// Tree is kept; only ownership and mode are checked
    Normalize,
    Install,
    Replace,
    Remove,
}

pub fn plan(ensure: TarballEnsure, on_disk: &OnDisk, source: Option<&str>) -> Plan {
    match ensure {
        TarballEnsure::Absent if on_disk.dir_exists || on_disk.recorded_source.is_some() => {
            Plan::Remove
        }
        TarballEnsure::Absent => Plan::Nothing,
        TarballEnsure::AnyVersion if on_disk.dir_exists => Plan::Normalize,
        TarballEnsure::AnyVersion => Plan::Install,
        TarballEnsure::Present if !on_disk.dir_exists => Plan::Install,
        TarballEnsure::Present if on_disk.recorded_source.as_deref() == source => {
            Plan::Normalize
        }
        TarballEnsure::Present => Plan::Replace,
    }
}

/// One archive-backed installation directory
#[derive(Debug, Clone)]
pub struct TarballResource {
    pub path: PathBuf,
    pub ensure: TarballEnsure,
    /// Required whenever the plan is to install or replace
    pub source: Option<Url>,
    /// Defaults to the sibling `.name.source_url`
    pub state_file: Option<PathBuf>,
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: u32,
}

impl TarballResource {
    pub fn new(path: impl Into<PathBuf>, ensure: TarballEnsure, source: Option<Url>) -> Self {
        Self {
            path: path.into(),
            ensure,
            source,
            state_file: None,
            owner: None,
            group: None,
            mode: DEFAULT_MODE,
        }
    }

    pub fn state_file_path(&self) -> Result<PathBuf, InstallError> {
        match &self.state_file {
            Some(path) => Ok(path.clone()),
            None => Ok(state_file(&self.path)?),
        }
    }

    pub async fn apply(&self, fetcher: &dyn Fetcher) -> Result<Outcome, InstallError> {
        let state_file = self.state_file_path()?;
        let on_disk = OnDisk::inspect(&self.path, &state_file)?;
        let source = self.source.as_ref().map(Url::as_str);
        let plan = plan(self.ensure, &on_disk, source);

        debug!(
            "{}: ensure {} with {:?} on disk: {:?}",
            self.path.display(),
            self.ensure,
            on_disk,
            plan
        );

        match plan {
            Plan::Nothing => Ok(Outcome::Unchanged),
            Plan::Normalize => {
                let ownership = Ownership::resolve(self.owner.as_deref(), self.group.as_deref())?;
                let mut changed = normalize_tree(&self.path, ownership, self.mode)?;
                if on_disk.recorded_source.is_some() {
                    changed |= normalize_file(&state_file, ownership, STATE_FILE_MODE)?;
                }
                Ok(if changed {
                    Outcome::Updated
                } else {
                    Outcome::Unchanged
                })
            }
            Plan::Remove => {
                remove_installation(&self.path, &state_file)?;
                info!("Removed {}", self.path.display());
                Ok(Outcome::Removed)
            }
            Plan::Install | Plan::Replace => {
                let source = self
                    .source
                    .as_ref()
                    .ok_or_else(|| InstallError::MissingSource {
                        path: self.path.clone(),
                    })?;
                self.install(fetcher, source, &state_file).await?;
                Ok(if plan == Plan::Install {
                    Outcome::Installed
                } else {
                    Outcome::Replaced
                })
            }
        }
    }

    async fn install(
        &self,
        fetcher: &dyn Fetcher,
        source: &Url,
        state_file: &Path,
    ) -> Result<(), InstallError> {
        // Resolve names before touching anything
        let ownership = Ownership::resolve(self.owner.as_deref(), self.group.as_deref())?;

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(InstallError::io("Failed to create directory", parent))?;

        // Staged next to the target so the final rename stays on one filesystem
        let download = tempfile::Builder::new()
            .prefix(".go-provision-download")
            .suffix(".tar.gz")
            .tempfile_in(parent)
            .map_err(InstallError::io("Failed to create download file", parent))?;
        fetcher.download(source, download.path()).await?;

        let staging = tempfile::Builder::new()
            .prefix(".go-provision-staging")
            .tempdir_in(parent)
            .map_err(InstallError::io("Failed to create staging directory", parent))?;
        extract_archive(download.path(), staging.path())?;

        remove_installation(&self.path, state_file)?;
        fs::rename(staging.path(), &self.path)
            .map_err(InstallError::io("Failed to move installation into place", &self.path))?;

        write_state_file(state_file, source)?;
        normalize_tree(&self.path, ownership, self.mode)?;
        normalize_file(state_file, ownership, STATE_FILE_MODE)?;

        info!("Installed {} from {}", self.path.display(), source);
        Ok(())
    }
}

fn write_state_file(path: &Path, source: &Url) -> Result<(), InstallError> {
    fs::write(path, format!("{}\n", source))
        .map_err(InstallError::io("Failed to write state file", path))?;
    fs::set_permissions(path, fs::Permissions::from_mode(STATE_FILE_MODE))
        .map_err(InstallError::io("Failed to set permissions", path))
}

fn remove_installation(path: &Path, state_file: &Path) -> Result<(), InstallError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => {
            fs::remove_dir_all(path).map_err(InstallError::io("Failed to remove", path))?
        }
        Ok(_) => fs::remove_file(path).map_err(InstallError::io("Failed to remove", path))?,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(InstallError::io("Failed to inspect", path)(e)),
    }

    match fs::remove_file(state_file) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(InstallError::io("Failed to remove state file", state_file)(e)),
    }
}
