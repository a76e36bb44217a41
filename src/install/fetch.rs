//! Archive download and extraction.
//!
//! Downloads Go archives over HTTP(S) and unpacks them with the archive's
//! top-level directory stripped, so `go/bin/go` lands at `<dest>/bin/go`.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
#[cfg(test)]
use mockall::automock;
use tar::Archive;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::DOWNLOAD_TIMEOUT_SECS;
use crate::install::error::InstallError;

/// Trait for fetching an archive to a local file
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Downloads `url` into the file at `dest`, replacing its contents
    async fn download(&self, url: &Url, dest: &Path) -> Result<(), InstallError>;
}

/// Fetcher implementation using reqwest
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("go-provision/", env!("CARGO_PKG_VERSION")))
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn download(&self, url: &Url, dest: &Path) -> Result<(), InstallError> {
        info!("Downloading {}", url);

        let download_error = |source| InstallError::Download {
            url: url.to_string(),
            source,
        };

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(download_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!("Download returned status {}: {}", status, url);
            return Err(InstallError::BadStatus {
                url: url.to_string(),
                status,
            });
        }

        let mut file =
            File::create(dest).map_err(InstallError::io("Failed to create download file", dest))?;
        let mut downloaded: u64 = 0;

        while let Some(chunk) = response.chunk().await.map_err(download_error)? {
            file.write_all(&chunk)
                .map_err(InstallError::io("Failed to write download data", dest))?;
            downloaded += chunk.len() as u64;
        }

        file.flush()
            .map_err(InstallError::io("Failed to write download data", dest))?;

        debug!(
            "Downloaded {} ({:.1} MB)",
            url,
            downloaded as f64 / 1_000_000.0
        );
        Ok(())
    }
}

/// Extract a `.tar.gz` archive into `dest_dir`, dropping the first path
/// component of every entry.
///
/// Entries are unpacked with tar's own containment checks into a scratch
/// directory inside `dest_dir`, then the contents of each top-level
/// directory are moved up.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<(), InstallError> {
    debug!(
        "Extracting {} to {}",
        archive_path.display(),
        dest_dir.display()
    );

    let extract_error = |source| InstallError::Extract {
        archive: archive_path.to_path_buf(),
        source,
    };
    let unsafe_entry = |entry: PathBuf| InstallError::UnsafeEntry {
        archive: archive_path.to_path_buf(),
        entry,
    };

    let unpack_root = tempfile::Builder::new()
        .prefix(".go-provision-unpack")
        .tempdir_in(dest_dir)
        .map_err(extract_error)?;

    let file = File::open(archive_path).map_err(extract_error)?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.set_preserve_permissions(true);
    archive.set_preserve_ownerships(false);

    let mut top_level = BTreeSet::new();
    for entry in archive.entries().map_err(extract_error)? {
        let mut entry = entry.map_err(extract_error)?;
        let entry_path = entry.path().map_err(extract_error)?.into_owned();

        let Some((top, _)) = split_top_level(&entry_path) else {
            return Err(unsafe_entry(entry_path));
        };
        top_level.insert(top);

        // Also refuses writes through symlinks unpacked earlier
        if !entry.unpack_in(unpack_root.path()).map_err(extract_error)? {
            return Err(unsafe_entry(entry_path));
        }
    }

    for top in top_level {
        let top_dir = unpack_root.path().join(&top);
        if !top_dir.is_dir() || top_dir.is_symlink() {
            continue;
        }
        for child in fs::read_dir(&top_dir).map_err(extract_error)? {
            let child = child.map_err(extract_error)?;
            let target = dest_dir.join(child.file_name());
            if target.symlink_metadata().is_ok() {
                return Err(unsafe_entry(Path::new(&top).join(child.file_name())));
            }
            fs::rename(child.path(), &target).map_err(extract_error)?;
        }
    }

    Ok(())
}

/// Splits off the first component; `None` if the path could escape the
/// destination
fn split_top_level(path: &Path) -> Option<(PathBuf, PathBuf)> {
    let mut components = path.components();
    let top = match components.next() {
        Some(Component::Normal(top)) => PathBuf::from(top),
        Some(Component::CurDir) => return split_top_level(components.as_path()),
        _ => return None,
    };

    let mut relative = PathBuf::new();
    for component in components {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some((top, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use mockito::Server;
    use rstest::rstest;
    use tempfile::TempDir;

    fn tarball(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
        for (path, content, mode) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, path, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[rstest]
    #[case("go/bin/go", Some("bin/go"))]
    #[case("./go/VERSION", Some("VERSION"))]
    #[case("go", Some(""))]
    #[case("go/../../etc/passwd", None)]
    #[case("/go/bin/go", None)]
    #[case("../go/bin/go", None)]
    fn split_top_level_removes_first_component(
        #[case] input: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(
            split_top_level(Path::new(input)).map(|(_, relative)| relative),
            expected.map(PathBuf::from)
        );
    }

    #[test]
    fn extract_archive_strips_top_level_directory() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("go.tar.gz");
        fs::write(
            &archive,
            tarball(&[
                ("go/VERSION", b"go1.19.1", 0o644),
                ("go/bin/go", b"#!/bin/sh\n", 0o755),
            ]),
        )
        .unwrap();
        let dest = dir.path().join("dest");
        fs::create_dir(&dest).unwrap();

        extract_archive(&archive, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("VERSION")).unwrap(), "go1.19.1");
        assert!(dest.join("bin/go").is_file());
    }

    #[test]
    fn extract_archive_refuses_to_write_through_symlink_entry() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();

        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::fast()));
        let mut link = tar::Header::new_gnu();
        link.set_entry_type(tar::EntryType::Symlink);
        link.set_path("go/escape").unwrap();
        link.set_link_name(outside.path()).unwrap();
        link.set_size(0);
        link.set_mode(0o777);
        link.set_cksum();
        builder.append(&link, std::io::empty()).unwrap();

        let mut file = tar::Header::new_gnu();
        file.set_size(5);
        file.set_mode(0o644);
        file.set_cksum();
        builder
            .append_data(&mut file, "go/escape/pwned", &b"owned"[..])
            .unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();

        let archive = dir.path().join("go.tar.gz");
        fs::write(&archive, bytes).unwrap();
        let dest = dir.path().join("dest");
        fs::create_dir(&dest).unwrap();

        let result = extract_archive(&archive, &dest);

        assert!(result.is_err());
        assert!(!outside.path().join("pwned").exists());
    }

    #[test]
    fn extract_archive_leaves_no_scratch_directory() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("go.tar.gz");
        fs::write(&archive, tarball(&[("go/bin/go", b"#!/bin/sh\n", 0o755)])).unwrap();
        let dest = dir.path().join("dest");
        fs::create_dir(&dest).unwrap();

        extract_archive(&archive, &dest).unwrap();

        let names: Vec<_> = fs::read_dir(&dest)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("bin")]);
    }

    #[test]
    fn extract_archive_rejects_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("go.tar.gz");
        fs::write(&archive, b"definitely not gzip").unwrap();

        let result = extract_archive(&archive, dir.path());

        assert!(matches!(result, Err(InstallError::Extract { .. })));
    }

    #[tokio::test]
    async fn http_fetcher_writes_body_to_dest() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/dl/go1.19.1.linux-amd64.tar.gz")
            .with_status(200)
            .with_body("archive bytes")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("download");
        let url = Url::parse(&format!("{}/dl/go1.19.1.linux-amd64.tar.gz", server.url())).unwrap();

        HttpFetcher::default().download(&url, &dest).await.unwrap();

        mock.assert_async().await;
        assert_eq!(fs::read_to_string(&dest).unwrap(), "archive bytes");
    }

    #[tokio::test]
    async fn http_fetcher_returns_bad_status_for_missing_archive() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/dl/go9.9.9.linux-amd64.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let url = Url::parse(&format!("{}/dl/go9.9.9.linux-amd64.tar.gz", server.url())).unwrap();

        let result = HttpFetcher::default()
            .download(&url, &dir.path().join("download"))
            .await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(InstallError::BadStatus { status, .. }) if status.as_u16() == 404
        ));
    }
}
