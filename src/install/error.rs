use std::path::PathBuf;

use thiserror::Error;

use crate::version::error::IndexError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateFileError {
    #[error("No reasonable default state_file for {path:?}")]
    NoDefault { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    StateFile(#[from] StateFileError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Download of {url} failed: HTTP {status}")]
    BadStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Failed to extract {archive:?}: {source}")]
    Extract {
        archive: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive {archive:?} contains an entry outside the installation: {entry:?}")]
    UnsafeEntry { archive: PathBuf, entry: PathBuf },

    #[error("No source URL to install {path:?} from")]
    MissingSource { path: PathBuf },

    #[error("Invalid source URL {url:?}: {source}")]
    InvalidSource {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("No Go download for platform {os}-{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Unknown user {0:?}")]
    UnknownUser(String),

    #[error("Unknown group {0:?}")]
    UnknownGroup(String),

    #[error("Failed to look up {name:?}: {source}")]
    Lookup {
        name: String,
        #[source]
        source: nix::Error,
    },

    #[error("Failed to change ownership of {path:?}: {source}")]
    Ownership {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("{message}: {path:?}: {source}")]
    Io {
        message: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    pub(crate) fn io(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let message = message.into();
        let path = path.into();
        move |source| InstallError::Io {
            message,
            path,
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Refusing to replace {path:?}: it exists and is not a symlink")]
    Occupied { path: PathBuf },

    #[error("{message}: {path:?}: {source}")]
    Io {
        message: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LinkError {
    pub(crate) fn io(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let message = message.into();
        let path = path.into();
        move |source| LinkError::Io {
            message,
            path,
            source,
        }
    }
}
