//! Ownership and permission normalization for installed trees

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use nix::unistd::{Gid, Group, Uid, User, chown};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::install::error::InstallError;

/// Resolved owner and group; `None` leaves that half untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    pub uid: Option<Uid>,
    pub gid: Option<Gid>,
}

impl Ownership {
    /// Looks up user and group names in the system database
    pub fn resolve(owner: Option<&str>, group: Option<&str>) -> Result<Self, InstallError> {
        let uid = owner
            .map(|name| {
                User::from_name(name)
                    .map_err(|source| InstallError::Lookup {
                        name: name.to_string(),
                        source,
                    })?
                    .map(|user| user.uid)
                    .ok_or_else(|| InstallError::UnknownUser(name.to_string()))
            })
            .transpose()?;

        let gid = group
            .map(|name| {
                Group::from_name(name)
                    .map_err(|source| InstallError::Lookup {
                        name: name.to_string(),
                        source,
                    })?
                    .map(|group| group.gid)
                    .ok_or_else(|| InstallError::UnknownGroup(name.to_string()))
            })
            .transpose()?;

        Ok(Self { uid, gid })
    }

    pub fn is_noop(&self) -> bool {
        self.uid.is_none() && self.gid.is_none()
    }

    fn differs(&self, metadata: &fs::Metadata) -> bool {
        self.uid.is_some_and(|uid| uid.as_raw() != metadata.uid())
            || self.gid.is_some_and(|gid| gid.as_raw() != metadata.gid())
    }
}

/// Applies ownership recursively under `root` and `mode` to `root` itself.
///
/// File modes inside the tree are left as extracted. Symlinks are skipped.
/// Returns whether anything was changed.
pub fn normalize_tree(root: &Path, ownership: Ownership, mode: u32) -> Result<bool, InstallError> {
    let mut changed = false;

    if !ownership.is_noop() {
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                InstallError::Io {
                    message: "Failed to walk installation".to_string(),
                    path,
                    source: e.into(),
                }
            })?;

            if entry.path_is_symlink() {
                continue;
            }
            changed |= normalize_owner(entry.path(), ownership)?;
        }
    }

    changed |= normalize_mode(root, mode)?;
    Ok(changed)
}

/// Applies ownership and mode to a single file
pub fn normalize_file(path: &Path, ownership: Ownership, mode: u32) -> Result<bool, InstallError> {
    let owner_changed = normalize_owner(path, ownership)?;
    let mode_changed = normalize_mode(path, mode)?;
    Ok(owner_changed || mode_changed)
}

fn normalize_owner(path: &Path, ownership: Ownership) -> Result<bool, InstallError> {
    if ownership.is_noop() {
        return Ok(false);
    }

    let metadata =
        fs::symlink_metadata(path).map_err(InstallError::io("Failed to inspect", path))?;
    if !ownership.differs(&metadata) {
        return Ok(false);
    }

    debug!("Changing ownership of {}", path.display());
    chown(path, ownership.uid, ownership.gid).map_err(|source| InstallError::Ownership {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}

fn normalize_mode(path: &Path, mode: u32) -> Result<bool, InstallError> {
    let metadata = fs::metadata(path).map_err(InstallError::io("Failed to inspect", path))?;
    let current = metadata.permissions().mode() & 0o7777;
    if current == mode {
        return Ok(false);
    }

    info!("Changing mode of {} from {:o} to {:o}", path.display(), current, mode);
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(InstallError::io("Failed to set permissions", path))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalize_tree_sets_top_level_mode_only() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("go");
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("bin/go"), "").unwrap();
        fs::set_permissions(&root, fs::Permissions::from_mode(0o700)).unwrap();
        fs::set_permissions(root.join("bin/go"), fs::Permissions::from_mode(0o755)).unwrap();

        let changed = normalize_tree(&root, Ownership::default(), 0o755).unwrap();

        assert!(changed);
        let mode = fs::metadata(&root).unwrap().permissions().mode() & 0o7777;
        assert_eq!(mode, 0o755);
        let bin_mode = fs::metadata(root.join("bin/go")).unwrap().permissions().mode() & 0o7777;
        assert_eq!(bin_mode, 0o755);
    }

    #[test]
    fn normalize_tree_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("go");
        fs::create_dir(&root).unwrap();

        normalize_tree(&root, Ownership::default(), 0o750).unwrap();
        let changed = normalize_tree(&root, Ownership::default(), 0o750).unwrap();

        assert!(!changed);
    }

    #[test]
    fn normalize_tree_to_current_owner_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("go");
        fs::create_dir(&root).unwrap();
        fs::set_permissions(&root, fs::Permissions::from_mode(0o755)).unwrap();
        let ownership = Ownership {
            uid: Some(Uid::effective()),
            gid: Some(Gid::effective()),
        };

        let changed = normalize_tree(&root, ownership, 0o755).unwrap();

        assert!(!changed);
    }

    #[test]
    fn resolve_rejects_unknown_user() {
        let result = Ownership::resolve(Some("no-such-user-go-provision"), None);

        assert!(matches!(result, Err(InstallError::UnknownUser(_))));
    }

    #[test]
    fn resolve_without_names_is_noop() {
        let ownership = Ownership::resolve(None, None).unwrap();

        assert!(ownership.is_noop());
    }
}
