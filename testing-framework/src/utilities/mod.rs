//! Testing utilities

/// Failure artifact collection for debugging invariant failures
pub mod artifacts;

pub use artifacts::{FailureArtifact, SnapshotDump};
