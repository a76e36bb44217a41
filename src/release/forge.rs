//! Link rewriting for the Forge
//!
//! Markdown link definitions (`[name]: destination`) that are relative to the
//! repository are rewritten to absolute URLs under
//! `{source}/blob/v{version}/`, so they still resolve when the README is
//! rendered on the Forge.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};
use url::Url;

use crate::release::error::ReleaseError;
use crate::release::metadata::Metadata;

static LINK_DEFINITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A\[(.+?)\]:\s*(.+)\z").expect("valid regex"));

/// Base URL relative links are resolved against
pub fn root_url(metadata: &Metadata) -> Result<Url, ReleaseError> {
    let url = format!(
        "{}/blob/v{}/",
        metadata.source.trim_end_matches('/'),
        metadata.version
    );
    Url::parse(&url).map_err(|source| ReleaseError::InvalidSource { url, source })
}

/// Resolves `destination` against `root` unless it already points somewhere
/// on its own (absolute URL, host-relative `//host/...`, or fragment/query only).
pub fn rewrite_destination(root: &Url, destination: &str) -> Option<Url> {
    if Url::parse(destination).is_ok() || destination.starts_with("//") {
        return None;
    }

    let path = destination
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    if path.is_empty() {
        return None;
    }

    match root.join(destination) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("Leaving link {:?} unchanged: {}", destination, e);
            None
        }
    }
}

/// Rewrites link definitions in one Markdown document
pub fn rewrite_links(root: &Url, content: &str) -> String {
    content
        .split_inclusive('\n')
        .map(|line| {
            let (text, ending) = match line.strip_suffix('\n') {
                Some(text) => (text, "\n"),
                None => (line, ""),
            };

            let Some(caps) = LINK_DEFINITION.captures(text) else {
                return line.to_string();
            };

            let name = &caps[1];
            let destination = &caps[2];
            match rewrite_destination(root, destination) {
                Some(url) => format!("[{}]: {}{}", name, url, ending),
                None => format!("[{}]: {}{}", name, destination, ending),
            }
        })
        .collect()
}

pub fn fix_links(root: &Url, path: &Path) -> Result<(), ReleaseError> {
    info!("Fixing links in {} for Forge", path.display());

    let content = fs::read_to_string(path).map_err(ReleaseError::io(path))?;
    fs::write(path, rewrite_links(root, &content)).map_err(ReleaseError::io(path))
}

/// Fixes links in every `*.md` file at the top of `repo`
pub fn update_for_forge(repo: &Path, metadata: &Metadata) -> Result<Vec<PathBuf>, ReleaseError> {
    let root = root_url(metadata)?;

    let pattern = format!(
        "{}/*.md",
        glob::Pattern::escape(&repo.to_string_lossy())
    );
    let paths = glob::glob(&pattern).map_err(|source| ReleaseError::Pattern {
        pattern: pattern.clone(),
        source,
    })?;

    let mut fixed = Vec::new();
    for path in paths {
        let path = path.map_err(|e| {
            let path = e.path().to_path_buf();
            ReleaseError::Io {
                path,
                source: e.into(),
            }
        })?;
        fix_links(&root, &path)?;
        fixed.push(path);
    }

    Ok(fixed)
}
