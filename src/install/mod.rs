//! Idempotent Go toolchain installation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Installation │────▶│   Tarball    │────▶│    Fetch     │
//! │  (version)   │     │ (source URL) │     │  (download)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!        │                    │
//!        ▼                    ▼
//! ┌──────────────┐     ┌──────────────┐
//! │   Platform   │     │  State file  │
//! │ (os / arch)  │     │  (sentinel)  │
//! └──────────────┘     └──────────────┘
//! ```
//!
//! [`links`] is applied separately and only touches the bin directory.
//!
//! # Modules
//!
//! - [`installation`]: `present` / `absent` / `latest` / exact version
//! - [`tarball`]: `present` / `any_version` / `absent` keyed by source URL
//! - [`fetch`]: Archive download and extraction
//! - [`ownership`]: Owner, group and mode normalization
//! - [`platform`]: Go names for the current OS and architecture
//! - [`state_file`]: Sentinel path derivation
//! - [`links`]: Symlinks into a shared bin directory

pub mod error;
pub mod fetch;
pub mod installation;
pub mod links;
pub mod ownership;
pub mod platform;
pub mod state_file;
pub mod tarball;

use std::fmt;

pub use error::{InstallError, LinkError, StateFileError};
pub use installation::Installation;
pub use links::{LinkChange, LinkEnsure, LinkedBinaries};
pub use platform::Platform;
pub use tarball::{TarballEnsure, TarballResource};

/// Result of applying a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Installed,
    Replaced,
    /// Ownership or mode was corrected on an existing tree
    Updated,
    Removed,
}

impl Outcome {
    pub fn changed(&self) -> bool {
        *self != Outcome::Unchanged
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Unchanged => "unchanged",
            Outcome::Installed => "installed",
            Outcome::Replaced => "replaced",
            Outcome::Updated => "updated",
            Outcome::Removed => "removed",
        })
    }
}
