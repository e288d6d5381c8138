//! Unified error types for the strata workspace.
//!
//! Build-time and launch-time failures are fatal by contract: nothing at
//! this layer retries or masks an error, it surfaces to the caller and
//! ultimately to the CLI's exit status.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum StrataError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A recipe failed to parse or validate.
    #[error("invalid recipe: {message}")]
    Recipe {
        /// Description of the recipe problem.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A content digest validation failed.
    #[error("digest mismatch for {resource}: expected {expected}, got {actual}")]
    HashMismatch {
        /// Resource that failed validation.
        resource: String,
        /// Expected digest value.
        expected: String,
        /// Actual computed digest value.
        actual: String,
    },

    /// A dependency manifest could not be read or understood.
    #[error("invalid dependency manifest {path}: {message}")]
    Manifest {
        /// Path to the offending manifest.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// The external package installer failed.
    #[error("installer failed: {message}")]
    Install {
        /// Description of the installer failure.
        message: String,
    },

    /// A service process could not be launched.
    #[error("launch failed: {message}")]
    Launch {
        /// Description of the launch failure.
        message: String,
    },

    /// Signaling or waiting on a launched process failed.
    #[error("process error: {message}")]
    Process {
        /// Description of the process operation failure.
        message: String,
    },

    /// An operation was refused by policy (e.g. remote fetch while offline).
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Description of the denied operation.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StrataError>;
