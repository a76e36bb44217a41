use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Mutex;

use flate2::Compression;
use flate2::write::GzEncoder;
use go_provision::install::error::InstallError;
use go_provision::install::fetch::Fetcher;
use go_provision::install::state_file::state_file;
use go_provision::install::{
    Installation, LinkChange, LinkEnsure, LinkedBinaries, Outcome, Platform,
};
use go_provision::version::cache::LatestVersionCache;
use go_provision::version::error::IndexError;
use go_provision::version::index::ReleaseIndex;
use go_provision::version::{Ensure, GoVersion};
use tempfile::TempDir;
use url::Url;

const PREFIX: &str = "https://dl.example.test/go";
const INDEX: &str = "https://dl.example.test/?mode=json";

/// Builds a Go-shaped archive: `go/VERSION`, `go/bin/go`, `go/bin/gofmt`
fn go_archive(version: &str) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let mut add = |path: &str, content: &[u8], mode: u32| {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(mode);
        header.set_cksum();
        builder.append_data(&mut header, path, content).unwrap();
    };
    add("go/VERSION", format!("go{version}\ntime 2023-01-01\n").as_bytes(), 0o644);
    add("go/bin/go", b"#!/bin/sh\n", 0o755);
    add("go/bin/gofmt", b"#!/bin/sh\n", 0o755);

    builder.into_inner().unwrap().finish().unwrap()
}

/// Serves archives from memory and counts downloads
#[derive(Default)]
struct ArchiveServer {
    archives: HashMap<String, Vec<u8>>,
    downloads: Mutex<Vec<String>>,
}

impl ArchiveServer {
    fn with_versions(versions: &[&str]) -> Self {
        let platform = platform();
        let archives = versions
            .iter()
            .map(|v| {
                let version = GoVersion::parse(v).unwrap();
                let url = platform.download_url(PREFIX, &version).unwrap();
                (url.to_string(), go_archive(v))
            })
            .collect();
        Self {
            archives,
            ..Self::default()
        }
    }

    fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Fetcher for ArchiveServer {
    async fn download(&self, url: &Url, dest: &Path) -> Result<(), InstallError> {
        self.downloads.lock().unwrap().push(url.to_string());
        let Some(bytes) = self.archives.get(url.as_str()) else {
            return Err(InstallError::BadStatus {
                url: url.to_string(),
                status: reqwest::StatusCode::NOT_FOUND,
            });
        };
        fs::write(dest, bytes).map_err(|source| InstallError::Io {
            message: "Failed to write archive".to_string(),
            path: dest.to_path_buf(),
            source,
        })
    }
}

/// Index that always reports the same version
struct FixedIndex {
    version: &'static str,
}

impl FixedIndex {
    fn new(version: &'static str) -> Self {
        Self { version }
    }
}

#[async_trait::async_trait]
impl ReleaseIndex for FixedIndex {
    async fn latest_stable(&self, _url: &str) -> Result<GoVersion, IndexError> {
        Ok(GoVersion::parse(self.version).unwrap())
    }
}

fn platform() -> Platform {
    Platform::new("linux", "amd64")
}

fn installation(path: &Path, ensure: &str) -> Installation {
    let mut installation = Installation::new(path, ensure.parse::<Ensure>().unwrap(), platform());
    installation.source_prefix = PREFIX.to_string();
    installation.index_url = INDEX.to_string();
    installation
}

fn mode(path: &Path) -> u32 {
    fs::metadata(path).unwrap().permissions().mode() & 0o7777
}

fn recorded_source(path: &Path) -> String {
    fs::read_to_string(state_file(path).unwrap()).unwrap()
}

#[tokio::test]
async fn exact_version_installs_once() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("go");
    let server = ArchiveServer::with_versions(&["1.19.1"]);
    let cache = LatestVersionCache::new(FixedIndex::new("1.21.0"));
    let go = installation(&path, "1.19.1");

    assert_eq!(go.apply(&cache, &server).await.unwrap(), Outcome::Installed);
    assert_eq!(go.apply(&cache, &server).await.unwrap(), Outcome::Unchanged);

    assert_eq!(server.download_count(), 1);
    assert!(path.join("bin/go").is_file());
    assert_eq!(
        fs::read_to_string(path.join("VERSION")).unwrap().lines().next(),
        Some("go1.19.1")
    );
    assert_eq!(
        recorded_source(&path),
        "https://dl.example.test/go/go1.19.1.linux-amd64.tar.gz\n"
    );
    assert_eq!(mode(&state_file(&path).unwrap()), 0o444);
    assert_eq!(mode(&path), 0o755);
}

#[tokio::test]
async fn changing_version_replaces_tree() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("go");
    let server = ArchiveServer::with_versions(&["1.19.1", "1.20.2"]);
    let cache = LatestVersionCache::new(FixedIndex::new("1.21.0"));

    installation(&path, "1.19.1").apply(&cache, &server).await.unwrap();
    fs::write(path.join("stray"), "left over").unwrap();

    let outcome = installation(&path, "1.20.2")
        .apply(&cache, &server)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Replaced);
    assert!(!path.join("stray").exists());
    assert!(recorded_source(&path).contains("go1.20.2."));
}

#[tokio::test]
async fn latest_resolves_through_index() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("go");
    let server = ArchiveServer::with_versions(&["1.21.0"]);
    let cache = LatestVersionCache::new(FixedIndex::new("1.21.0"));
    let go = installation(&path, "latest");

    assert_eq!(go.apply(&cache, &server).await.unwrap(), Outcome::Installed);
    assert_eq!(go.apply(&cache, &server).await.unwrap(), Outcome::Unchanged);

    assert!(recorded_source(&path).contains("go1.21.0."));
    assert_eq!(server.download_count(), 1);
}

#[tokio::test]
async fn present_keeps_any_existing_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("go");
    let server = ArchiveServer::with_versions(&["1.19.1", "1.21.0"]);
    let cache = LatestVersionCache::new(FixedIndex::new("1.21.0"));

    installation(&path, "1.19.1").apply(&cache, &server).await.unwrap();

    let outcome = installation(&path, "present")
        .apply(&cache, &server)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Unchanged);
    assert!(recorded_source(&path).contains("go1.19.1."));
    assert_eq!(server.download_count(), 1);
}

#[tokio::test]
async fn present_installs_latest_when_missing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("go");
    let server = ArchiveServer::with_versions(&["1.21.0"]);
    let cache = LatestVersionCache::new(FixedIndex::new("1.21.0"));

    let outcome = installation(&path, "present")
        .apply(&cache, &server)
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Installed);
    assert!(recorded_source(&path).contains("go1.21.0."));
}

#[tokio::test]
async fn absent_removes_tree_and_sentinel() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("go");
    let server = ArchiveServer::with_versions(&["1.19.1"]);
    let cache = LatestVersionCache::new(FixedIndex::new("1.21.0"));

    installation(&path, "1.19.1").apply(&cache, &server).await.unwrap();
    let sentinel = state_file(&path).unwrap();

    let go = installation(&path, "absent");
    assert_eq!(go.apply(&cache, &server).await.unwrap(), Outcome::Removed);
    assert_eq!(go.apply(&cache, &server).await.unwrap(), Outcome::Unchanged);

    assert!(!path.exists());
    assert!(!sentinel.exists());
}

#[tokio::test]
async fn missing_archive_leaves_nothing_behind() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("go");
    let server = ArchiveServer::default();
    let cache = LatestVersionCache::new(FixedIndex::new("1.21.0"));

    let result = installation(&path, "1.19.1").apply(&cache, &server).await;

    assert!(matches!(result, Err(InstallError::BadStatus { .. })));
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn links_follow_installation_lifecycle() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("go");
    let bin = temp.path().join("bin");
    fs::create_dir(&bin).unwrap();
    let server = ArchiveServer::with_versions(&["1.19.1"]);
    let cache = LatestVersionCache::new(FixedIndex::new("1.21.0"));

    installation(&path, "1.19.1").apply(&cache, &server).await.unwrap();

    let changes = LinkedBinaries::new(&path, &bin, LinkEnsure::Present)
        .apply()
        .unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(fs::read_link(bin.join("go")).unwrap(), path.join("bin/go"));
    assert!(
        LinkedBinaries::new(&path, &bin, LinkEnsure::Present)
            .apply()
            .unwrap()
            .is_empty()
    );

    let removed = LinkedBinaries::new(&path, &bin, LinkEnsure::Absent)
        .apply()
        .unwrap();
    installation(&path, "absent").apply(&cache, &server).await.unwrap();

    assert_eq!(removed.len(), 2);
    assert!(
        removed
            .iter()
            .all(|change| matches!(change, LinkChange::Removed { .. }))
    );
    assert_eq!(fs::read_dir(&bin).unwrap().count(), 0);
}
