//! Version layer for Go toolchain resolution
//!
//! This module provides the version grammar, ensure directives, and the
//! lookup of the newest stable Go release from a remote index.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │    Index    │────▶│    Cache    │◀────│  Installer  │
//! │   (fetch)   │     │ (600s TTL)  │     │  (latest)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                                                ▼
//!                                         ┌─────────────┐
//!                                         │    Types    │
//!                                         │ (GoVersion) │
//!                                         └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`]: In-process latest-version cache keyed by index URL
//! - [`index`]: Release index trait and the go.dev implementation
//! - [`error`]: Error types for parsing and index lookups
//! - [`semver`]: Comparison helpers built on the semver crate
//! - [`types`]: `GoVersion` and `Ensure`

pub mod cache;
pub mod error;
pub mod index;
pub mod semver;
pub mod types;

pub use types::{Ensure, GoVersion};
