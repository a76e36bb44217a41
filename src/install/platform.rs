//! Platform detection for Go archive downloads.

use std::fmt;

use url::Url;

use crate::install::error::InstallError;
use crate::version::GoVersion;

/// Operating system and architecture as spelled in Go archive names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Detect the current platform.
    ///
    /// Only platforms Go ships `.tar.gz` archives for are recognised.
    pub fn current() -> Result<Self, InstallError> {
        Self::from_rust(std::env::consts::OS, std::env::consts::ARCH)
    }

    fn from_rust(os: &str, arch: &str) -> Result<Self, InstallError> {
        let unsupported = || InstallError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };

        let go_os = match os {
            "linux" => "linux",
            "macos" => "darwin",
            "freebsd" => "freebsd",
            "netbsd" => "netbsd",
            "openbsd" => "openbsd",
            _ => return Err(unsupported()),
        };

        let go_arch = match arch {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            "arm" => "armv6l",
            "powerpc64" => "ppc64le",
            "s390x" => "s390x",
            "riscv64" => "riscv64",
            "loongarch64" => "loong64",
            _ => return Err(unsupported()),
        };

        Ok(Self::new(go_os, go_arch))
    }

    /// Archive name for a version, e.g. `go1.19.1.linux-amd64.tar.gz`
    pub fn archive_filename(&self, version: &GoVersion) -> String {
        format!("go{}.{}-{}.tar.gz", version, self.os, self.arch)
    }

    /// Full download URL for a version under `prefix`
    pub fn download_url(&self, prefix: &str, version: &GoVersion) -> Result<Url, InstallError> {
        let url = format!(
            "{}/{}",
            prefix.trim_end_matches('/'),
            self.archive_filename(version)
        );
        Url::parse(&url).map_err(|source| InstallError::InvalidSource { url, source })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}
