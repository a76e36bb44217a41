//! Go version strings and ensure directives

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::version::error::VersionError;

/// First segment must not be zero, later segments may be a literal `0`.
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A[1-9][0-9]*(?:\.(?:0|[1-9][0-9]*))*(?:rc[0-9]+)?\z")
        .expect("version pattern is valid")
});

/// A validated Go release version such as `1.19.1` or `1.3rc1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GoVersion {
    raw: String,
    segments: Vec<u64>,
    rc: Option<u64>,
}

impl GoVersion {
    pub fn parse(value: &str) -> Result<Self, VersionError> {
        if !VERSION_RE.is_match(value) {
            return Err(VersionError::InvalidVersion(value.to_string()));
        }

        let (numeric, rc) = match value.split_once("rc") {
            Some((numeric, rc)) => (numeric, Some(rc)),
            None => (value, None),
        };

        let invalid = || VersionError::InvalidVersion(value.to_string());
        let segments = numeric
            .split('.')
            .map(|segment| segment.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;
        let rc = rc
            .map(|rc| rc.parse::<u64>().map_err(|_| invalid()))
            .transpose()?;

        Ok(Self {
            raw: value.to_string(),
            segments,
            rc,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Numeric dot-separated segments, without the rc suffix.
    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// Release candidate number, if this is a pre-release.
    pub fn rc(&self) -> Option<u64> {
        self.rc
    }

    pub fn is_prerelease(&self) -> bool {
        self.rc.is_some()
    }

    fn segment(&self, index: usize) -> u64 {
        self.segments.get(index).copied().unwrap_or(0)
    }
}

impl Ord for GoVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            match self.segment(i).cmp(&other.segment(i)) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }

        // A final release sorts after all of its release candidates
        match (self.rc, other.rc) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => a.cmp(&b),
        }
    }
}

impl PartialOrd for GoVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for GoVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for GoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Desired state of a versioned Go installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ensure {
    /// Any installed version is fine; install the newest if nothing is there
    Present,
    /// The installation must not exist
    Absent,
    /// The installation must match the newest stable release
    Latest,
    /// The installation must match exactly this version
    Version(GoVersion),
}

impl FromStr for Ensure {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Ensure::Present),
            "absent" => Ok(Ensure::Absent),
            "latest" => Ok(Ensure::Latest),
            other => GoVersion::parse(other)
                .map(Ensure::Version)
                .map_err(|_| VersionError::InvalidEnsure(other.to_string())),
        }
    }
}

impl fmt::Display for Ensure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ensure::Present => f.write_str("present"),
            Ensure::Absent => f.write_str("absent"),
            Ensure::Latest => f.write_str("latest"),
            Ensure::Version(version) => version.fmt(f),
        }
    }
}
