//! Content hashing, timestamp comparison and diff generation
//!
//! This module provides read-only analysis used by modified-item discovery:
//! - Content identity via SHA-256 hashing of files and canonical JSON
//! - Local mtimes and remote `lastModified` ordering
//! - Visual diffs between a local artifact and its remote counterpart

mod diff;
mod hash;
mod timestamp;

pub use diff::DiffGenerator;
pub use hash::ContentHasher;
pub use timestamp::TimestampComparator;
