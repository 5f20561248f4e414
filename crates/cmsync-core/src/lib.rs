//! # cmsync-core
//!
//! Core library for synchronizing typed content artifacts between a local
//! working directory and a remote content hub authoring API.
//!
//! The library provides:
//! - Artifact model and per-type configuration (`artifact`, `kinds`)
//! - Local JSON item folders and the remote REST endpoints (`store`)
//! - The persisted hash manifest used for modified-item discovery (`manifest`)
//! - The reconciliation engine with its event surface, concurrency throttle
//!   and retry policy (`sync`)
//! - Configuration discovery, merging and validation (`config`)

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Core error types for the cmsync library
pub mod error;

/// Artifact documents and references
pub mod artifact;

/// Artifact type catalogue
pub mod kinds;

/// Content hashing, timestamps and diffs
pub mod comparison;

/// Configuration file parsing and management
pub mod config;

/// Persisted record of last-synced hashes and timestamps
pub mod manifest;

/// Local and remote item stores
pub mod store;

/// Push/pull reconciliation engine
pub mod sync;

pub use artifact::{Artifact, ArtifactRef};
pub use error::{Result, SyncError};
pub use kinds::{ArtifactKind, IdentityStrategy, ItemTypeConfig};
