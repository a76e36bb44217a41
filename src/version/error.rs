use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid Go version: {0:?}")]
    InvalidVersion(String),

    #[error("Invalid ensure value: {0:?} (expected present, absent, latest or a version)")]
    InvalidEnsure(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Could not connect to {url:?} to get latest Go version: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Bad response from {url:?} while getting latest Go version: {status}")]
    BadStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Unexpected or invalid JSON from {url:?} while getting latest Go version")]
    InvalidJson { url: String },

    #[error("Could not find a stable Go version at {url:?}")]
    NoStable { url: String },
}
