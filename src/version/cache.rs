use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::LATEST_VERSION_TTL;
use crate::version::error::IndexError;
use crate::version::index::{GoDevIndex, ReleaseIndex};
use crate::version::types::GoVersion;

/// Process-wide cache used by [`latest_version`]
static LATEST_VERSION_CACHE: LazyLock<LatestVersionCache<GoDevIndex>> =
    LazyLock::new(|| LatestVersionCache::new(GoDevIndex::new()));

/// Resolve the newest stable Go version at `url`, cached for ten minutes
pub async fn latest_version(url: &str) -> Result<GoVersion, IndexError> {
    LATEST_VERSION_CACHE.latest(url).await
}

#[derive(Debug, Clone)]
struct CacheEntry {
    fetched_at: Instant,
    version: GoVersion,
}

/// Keyed by index URL. Entries go stale after `ttl` and are refetched;
/// there is no other eviction.
pub struct LatestVersionCache<I: ReleaseIndex> {
    index: I,
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl<I: ReleaseIndex> LatestVersionCache<I> {
    pub fn new(index: I) -> Self {
        Self::with_ttl(index, LATEST_VERSION_TTL)
    }

    pub fn with_ttl(index: I, ttl: Duration) -> Self {
        Self {
            index,
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // Entries are plain values; a panic mid-insert cannot leave them torn
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn latest(&self, url: &str) -> Result<GoVersion, IndexError> {
        self.latest_at(url, Instant::now()).await
    }

    /// Same as [`latest`](Self::latest) with an explicit clock reading
    pub async fn latest_at(&self, url: &str, now: Instant) -> Result<GoVersion, IndexError> {
        let cached = self
            .lock_entries()
            .get(url)
            .filter(|entry| now.saturating_duration_since(entry.fetched_at) < self.ttl)
            .map(|entry| entry.version.clone());

        if let Some(version) = cached {
            debug!("Using cached latest version {} for {}", version, url);
            return Ok(version);
        }

        let version = self.index.latest_stable(url).await?;
        info!("Latest stable Go version at {} is {}", url, version);

        self.lock_entries().insert(
            url.to_string(),
            CacheEntry {
                fetched_at: now,
                version: version.clone(),
            },
        );

        Ok(version)
    }
}
