//! Symlinks from a shared bin directory into an installation
//!
//! `present` links every entry of `{source}/bin` into `into_bin`; `absent`
//! removes the symlinks in `into_bin` that point into `{source}/bin`, which
//! keeps working after the installation itself is gone.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::symlink;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::install::error::LinkError;
use crate::version::error::VersionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEnsure {
    Present,
    Absent,
}

impl FromStr for LinkEnsure {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(LinkEnsure::Present),
            "absent" => Ok(LinkEnsure::Absent),
            other => Err(VersionError::InvalidEnsure(other.to_string())),
        }
    }
}

impl fmt::Display for LinkEnsure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkEnsure::Present => "present",
            LinkEnsure::Absent => "absent",
        })
    }
}

/// A single change made to `into_bin`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkChange {
    Created { link: PathBuf, target: PathBuf },
    Repointed { link: PathBuf, target: PathBuf },
    Removed { link: PathBuf },
}

impl fmt::Display for LinkChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkChange::Created { link, target } => {
                write!(f, "created {} -> {}", link.display(), target.display())
            }
            LinkChange::Repointed { link, target } => {
                write!(f, "repointed {} -> {}", link.display(), target.display())
            }
            LinkChange::Removed { link } => write!(f, "removed {}", link.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkedBinaries {
    /// Installation directory; binaries are read from its `bin`
    pub source: PathBuf,
    pub into_bin: PathBuf,
    pub ensure: LinkEnsure,
}

impl LinkedBinaries {
    pub fn new(
        source: impl Into<PathBuf>,
        into_bin: impl Into<PathBuf>,
        ensure: LinkEnsure,
    ) -> Self {
        Self {
            source: source.into(),
            into_bin: into_bin.into(),
            ensure,
        }
    }

    fn source_bin(&self) -> PathBuf {
        self.source.join("bin")
    }

    pub fn apply(&self) -> Result<Vec<LinkChange>, LinkError> {
        let changes = match self.ensure {
            LinkEnsure::Present => self.link()?,
            LinkEnsure::Absent => self.unlink()?,
        };

        for change in &changes {
            info!("Link {}", change);
        }
        Ok(changes)
    }

    fn link(&self) -> Result<Vec<LinkChange>, LinkError> {
        if !self.into_bin.is_dir() {
            return Err(LinkError::io("Link directory does not exist", &self.into_bin)(
                ErrorKind::NotFound.into(),
            ));
        }

        let mut changes = Vec::new();
        for name in binary_names(&self.source_bin())? {
            let link = self.into_bin.join(&name);
            let target = self.source_bin().join(&name);

            match fs::symlink_metadata(&link) {
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    symlink(&target, &link)
                        .map_err(LinkError::io("Failed to create symlink", &link))?;
                    changes.push(LinkChange::Created { link, target });
                }
                Err(e) => return Err(LinkError::io("Failed to inspect", &link)(e)),
                Ok(metadata) if !metadata.file_type().is_symlink() => {
                    return Err(LinkError::Occupied { path: link });
                }
                Ok(_) => {
                    let current = fs::read_link(&link)
                        .map_err(LinkError::io("Failed to read symlink", &link))?;
                    if current == target {
                        debug!("{} already points to {}", link.display(), target.display());
                        continue;
                    }

                    fs::remove_file(&link)
                        .map_err(LinkError::io("Failed to remove symlink", &link))?;
                    symlink(&target, &link)
                        .map_err(LinkError::io("Failed to create symlink", &link))?;
                    changes.push(LinkChange::Repointed { link, target });
                }
            }
        }

        Ok(changes)
    }

    fn unlink(&self) -> Result<Vec<LinkChange>, LinkError> {
        let entries = match fs::read_dir(&self.into_bin) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LinkError::io("Failed to read directory", &self.into_bin)(e)),
        };

        let source_bin = normalize(&self.source_bin());
        let mut links = Vec::new();
        for entry in entries {
            let entry = entry.map_err(LinkError::io("Failed to read directory", &self.into_bin))?;
            let file_type = entry
                .file_type()
                .map_err(LinkError::io("Failed to inspect", entry.path()))?;
            if file_type.is_symlink() {
                links.push(entry.path());
            }
        }
        links.sort();

        let mut changes = Vec::new();
        for link in links {
            let target =
                fs::read_link(&link).map_err(LinkError::io("Failed to read symlink", &link))?;
            let resolved = resolve_target(&self.into_bin, &target);

            if resolved.starts_with(&source_bin) {
                fs::remove_file(&link).map_err(LinkError::io("Failed to remove symlink", &link))?;
                changes.push(LinkChange::Removed { link });
            } else if source_bin.join(link.file_name().unwrap_or_default()).exists() {
                warn!(
                    "Leaving {}: it points to {} instead of {}",
                    link.display(),
                    target.display(),
                    source_bin.display()
                );
            }
        }

        Ok(changes)
    }
}

/// Sorted file names in `bin`
fn binary_names(bin: &Path) -> Result<Vec<String>, LinkError> {
    let entries = fs::read_dir(bin).map_err(LinkError::io("Failed to read directory", bin))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(LinkError::io("Failed to read directory", bin))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

/// Relative symlink targets are relative to the link's directory.
///
/// `.` and `..` are folded lexically; the target may no longer exist.
fn resolve_target(link_dir: &Path, target: &Path) -> PathBuf {
    normalize(&link_dir.join(target))
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
