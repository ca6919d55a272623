//! Path Space Error Hierarchy
//!
//! Defines the error types surfaced by the space, its task pool and its
//! configuration layer. Path-resolution failures are returned as values so
//! callers can tell "nothing there yet" (retry-worthy) apart from "wrong
//! type" (programmer error) and "timed out" (policy decision).

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Result of insert/read/take/visit at the space boundary
pub type SpaceResult<T> = std::result::Result<T, SpaceError>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Path resolution, typing and blocking failures at the space boundary
    #[error(transparent)]
    Space(#[from] SpaceError),

    /// Worker pool failures (submission after shutdown, thread spawn)
    #[error(transparent)]
    Task(#[from] TaskError),

    /// Configuration loading and validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns the space-level error if this is one
    pub fn space(&self) -> Option<&SpaceError> {
        match self {
            Error::Space(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors reported by insert/read/take/visit.
///
/// Grouped as:
/// - not found: [`SpaceError::NoSuchPath`], [`SpaceError::NoObjectFound`]
/// - contract violation: [`SpaceError::InvalidPath`], [`SpaceError::InvalidType`],
///   [`SpaceError::InvalidPermissions`], [`SpaceError::UnserializableType`]
/// - policy: [`SpaceError::Timeout`]
/// - unexpected: [`SpaceError::UnknownError`], [`SpaceError::TaskFailed`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpaceError {
    /// Malformed path text, rejected before touching the tree
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// No node exists at the literal path
    #[error("No such path: {path}")]
    NoSuchPath { path: String },

    /// Node exists but holds no available value
    #[error("No object found at {path}")]
    NoObjectFound { path: String },

    /// The oldest slot at the path holds a different type
    #[error("Type mismatch at {path}: requested {expected}, stored {found}")]
    InvalidType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Blocking budget exhausted
    #[error("Timed out after {duration:?} waiting on {path}")]
    Timeout { path: String, duration: Duration },

    /// Operation not allowed on this space
    #[error("Permission denied: {0}")]
    InvalidPermissions(String),

    /// Payload could not be encoded or decoded
    #[error("Type {type_name} cannot be (de)serialized: {reason}")]
    UnserializableType { type_name: &'static str, reason: String },

    /// The stored callable panicked; its failure is recorded in the slot
    #[error("Task at {path} failed: {message}")]
    TaskFailed { path: String, message: String },

    /// Internal invariant violation
    #[error("Unknown error: {0}")]
    UnknownError(String),
}

impl SpaceError {
    /// Expected during polling/blocking patterns; worth retrying
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SpaceError::NoSuchPath { .. } | SpaceError::NoObjectFound { .. }
        )
    }

    /// Programmer error, never retried
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            SpaceError::InvalidPath { .. }
                | SpaceError::InvalidType { .. }
                | SpaceError::InvalidPermissions(_)
                | SpaceError::UnserializableType { .. }
        )
    }

    /// Caller-chosen budget exhausted
    pub fn is_policy(&self) -> bool {
        matches!(self, SpaceError::Timeout { .. })
    }

    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            SpaceError::UnknownError(_) | SpaceError::TaskFailed { .. }
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Submission after the pool stopped accepting work
    #[error("Task pool is shut down")]
    PoolShutdown,

    /// OS refused to create a worker thread
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(String),
}
