//! CHANGELOG.md handling
//!
//! The first level-2 heading is the in-development section. Releasing
//! renames it and captures its body as release notes; afterwards a fresh
//! development heading is put back in front.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::release::error::ReleaseError;

static LEVEL_2_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\A##[^#]").expect("valid regex"));

static BLANK_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\A\s*\z").expect("valid regex"));

/// A changelog as lines, each keeping its line terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changelog {
    path: PathBuf,
    lines: Vec<String>,
}

impl Changelog {
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Self {
        Self {
            path: path.into(),
            lines: content.split_inclusive('\n').map(str::to_string).collect(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, ReleaseError> {
        let content = fs::read_to_string(path).map_err(ReleaseError::io(path))?;
        Ok(Self::parse(path, &content))
    }

    pub fn write(&self) -> Result<(), ReleaseError> {
        fs::write(&self.path, self.to_string()).map_err(ReleaseError::io(&self.path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn first_heading(&self) -> Result<usize, ReleaseError> {
        self.lines
            .iter()
            .position(|line| LEVEL_2_HEADING.is_match(line))
            .ok_or_else(|| ReleaseError::NoHeading {
                path: self.path.clone(),
            })
    }

    /// Renames the first level-2 heading to `## Release {version}` and
    /// returns the section body with surrounding blank lines trimmed.
    pub fn extract_release(&mut self, version: &str) -> Result<String, ReleaseError> {
        let heading = self.first_heading()?;
        self.lines[heading] = format!("## Release {}\n", version);

        let body = &self.lines[heading + 1..];
        let mut notes: Vec<&str> = body
            .iter()
            .skip_while(|line| BLANK_LINE.is_match(line))
            .take_while(|line| !LEVEL_2_HEADING.is_match(line))
            .map(String::as_str)
            .collect();

        while notes.last().is_some_and(|line| BLANK_LINE.is_match(line)) {
            notes.pop();
        }

        Ok(notes.concat())
    }

    /// Inserts `{header}` and a blank line before the first level-2 heading
    pub fn insert_dev_header(&mut self, header: &str) -> Result<(), ReleaseError> {
        let heading = self.first_heading()?;
        self.lines.insert(heading, "\n".to_string());
        self.lines.insert(heading, format!("{}\n", header));
        Ok(())
    }
}

impl fmt::Display for Changelog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            f.write_str(line)?;
        }
        Ok(())
    }
}
