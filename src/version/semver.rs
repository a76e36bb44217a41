use semver::{Prerelease, Version};

use crate::version::types::GoVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Latest,
    Outdated,
    Newer,
    Invalid,
}

/// Parse a Go version string into a semver::Version, normalizing partial versions.
///
/// Handles partial versions like "1" or "1.2" by padding with zeros, and
/// turns Go's `rcN` suffix into a semver pre-release.
///
/// Examples:
/// - "1" -> Version(1, 0, 0)
/// - "1.21" -> Version(1, 21, 0)
/// - "1.21rc2" -> Version(1, 21, 0, pre: "rc2")
///
/// Returns None for versions with more than three numeric segments.
pub fn parse_version(version: &GoVersion) -> Option<Version> {
    let segments = version.segments();
    if segments.len() > 3 {
        return None;
    }

    let get = |i: usize| segments.get(i).copied().unwrap_or(0);
    let mut parsed = Version::new(get(0), get(1), get(2));
    if let Some(rc) = version.rc() {
        parsed.pre = Prerelease::new(&format!("rc{}", rc)).ok()?;
    }
    Some(parsed)
}

/// Compare an installed version against the newest available one.
pub fn compare_versions(current: &str, latest: &str) -> CompareResult {
    let (Ok(current), Ok(latest)) = (GoVersion::parse(current), GoVersion::parse(latest)) else {
        return CompareResult::Invalid;
    };

    let ordering = match (parse_version(&current), parse_version(&latest)) {
        (Some(current), Some(latest)) => current.cmp(&latest),
        _ => current.cmp(&latest),
    };

    match ordering {
        std::cmp::Ordering::Less => CompareResult::Outdated,
        std::cmp::Ordering::Equal => CompareResult::Latest,
        std::cmp::Ordering::Greater => CompareResult::Newer,
    }
}
