use std::path::PathBuf;

use thiserror::Error;

use crate::release::pipeline::Step;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command {program} not found")]
    NotFound { program: String },

    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command returned non-zero: {command}")]
    Failed {
        command: String,
        /// Exit code, `None` when killed by a signal
        status: Option<i32>,
        /// Combined stdout and stderr for captured commands
        output: String,
    },
}

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("Failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid release configuration in {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Found untracked files.")]
    UntrackedFiles,

    #[error("No level 2 heading in {path:?}")]
    NoHeading { path: PathBuf },

    #[error("No \"version\" field to update in {path:?}")]
    NoMetadataVersion { path: PathBuf },

    #[error("Invalid metadata in {path:?}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid source URL {url:?}: {source}")]
    InvalidSource {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid file pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("No release artifact matches {pattern:?}")]
    MissingArtifact { pattern: String },

    #[error("{step} failed: {source}")]
    Step {
        step: Step,
        #[source]
        source: Box<ReleaseError>,
    },
}

impl ReleaseError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| ReleaseError::Io { path, source }
    }
}
