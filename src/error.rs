//! Error types for spectre-monitor
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// spectre-monitor error types
#[derive(Error, Debug)]
pub enum Error {
    /// Watched log file missing at startup (fatal, non-retryable)
    #[error("Log file not found: {}\nStart the simulation (or fix the path) before tailing", .0.display())]
    LogNotFound(PathBuf),

    /// Database or collection name cannot be mapped to a directory
    #[error("Invalid store name {name:?}: {reason}")]
    InvalidName {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Document `_id` cannot be used as a file name
    #[error("Invalid document id {0:?}: ids must be non-empty text or integers without path separators")]
    InvalidId(String),

    /// Atomic temp-file + rename write failed
    #[error("Failed to persist document to {}: {source}", path.display())]
    Persist {
        /// Destination document path
        path: PathBuf,
        /// Underlying IO failure
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
