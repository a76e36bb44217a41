//! Release index client for discovering the newest stable Go version

#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::version::error::IndexError;
use crate::version::types::GoVersion;

/// Tag every version in the release index is prefixed with
const VERSION_PREFIX: &str = "go";

/// One entry of the release index (`https://go.dev/dl/?mode=json`)
#[derive(Debug, Deserialize)]
struct Release {
    version: String,
    stable: bool,
}

/// Trait for resolving the newest stable release from a remote index
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait ReleaseIndex: Send + Sync {
    /// Fetches the index at `url` and returns the first version marked stable
    async fn latest_stable(&self, url: &str) -> Result<GoVersion, IndexError>;
}

/// Index implementation backed by the go.dev JSON download listing
pub struct GoDevIndex {
    client: reqwest::Client,
}

impl GoDevIndex {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("go-provision/", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

impl Default for GoDevIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReleaseIndex for GoDevIndex {
    async fn latest_stable(&self, url: &str) -> Result<GoVersion, IndexError> {
        debug!("Fetching release index from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| IndexError::Connect {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Release index returned status {}: {}", status, url);
            return Err(IndexError::BadStatus {
                url: url.to_string(),
                status,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| IndexError::Connect {
                url: url.to_string(),
                source,
            })?;

        first_stable(&body).map_err(|e| {
            warn!("Failed to resolve latest version from {}: {}", url, e);
            match e {
                FirstStableError::Json => IndexError::InvalidJson {
                    url: url.to_string(),
                },
                FirstStableError::NoStable => IndexError::NoStable {
                    url: url.to_string(),
                },
            }
        })
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
enum FirstStableError {
    #[error("invalid JSON")]
    Json,
    #[error("no stable release")]
    NoStable,
}

/// Picks the first stable release out of a release index body
fn first_stable(body: &str) -> Result<GoVersion, FirstStableError> {
    let releases: Vec<Release> = serde_json::from_str(body).map_err(|_| FirstStableError::Json)?;

    let release = releases
        .into_iter()
        .find(|release| release.stable)
        .ok_or(FirstStableError::NoStable)?;

    let version = release
        .version
        .strip_prefix(VERSION_PREFIX)
        .unwrap_or(&release.version);

    GoVersion::parse(version).map_err(|_| FirstStableError::Json)
}
