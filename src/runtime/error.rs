//! Error types for the trigger runtime
//!
//! Domain errors use thiserror; host-supplied operations report failures
//! through anyhow and are folded into interpreter runtime errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::interpreter::CompileError;

/// Top-level trigger manager error
#[derive(Debug, Error)]
pub enum TriggerError {
    /// Script failed to compile
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// No trigger registered under the name
    #[error("Trigger '{0}' not found")]
    NotFound(String),

    /// Activations need a tokio runtime to spawn onto
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors from config and globals snapshot files
#[derive(Debug, Error)]
pub enum StorageError {
    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Atomic write failed
    #[error("Atomic write failed for {path}: {detail}")]
    AtomicWriteFailed {
        /// Path where write failed
        path: PathBuf,
        /// Error details
        detail: String,
    },

    /// Snapshot contents were not usable
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type using TriggerError
pub type Result<T> = std::result::Result<T, TriggerError>;
