//! Release automation for a Puppet module repository
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Pipeline   │────▶│   Runner     │────▶│  git / pdk   │
//! │   (steps)    │     │  (dry-run)   │     │  gh / tests  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!        │
//!        ├──▶ changelog  (release notes, dev header)
//!        ├──▶ metadata   (version bump)
//!        ├──▶ forge      (link rewriting)
//!        └──▶ markdown   (unwrapping notes)
//! ```
//!
//! # Modules
//!
//! - [`pipeline`]: Ordered steps with abort-on-first-failure
//! - [`command`]: Process runner with dry-run support
//! - [`changelog`]: CHANGELOG.md section handling
//! - [`metadata`]: metadata.json version update
//! - [`forge`]: Relative link rewriting for the Forge
//! - [`markdown`]: Soft-wrapped list item unwrapping
//! - [`error`]: Error types

pub mod changelog;
pub mod command;
pub mod error;
pub mod forge;
pub mod markdown;
pub mod metadata;
pub mod pipeline;

pub use command::{CommandRunner, Runner};
pub use error::{CommandError, ReleaseError};
pub use pipeline::{Release, ReleaseOptions, Step};
