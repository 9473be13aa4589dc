// src/error.rs

//! Error types for the pmt library
//!
//! Lower layers report failures through [`Error`]; the dependency resolver
//! has its own [`ResolveError`] so callers can tell a missing package from a
//! dependency cycle without string matching.

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Download error: {0}")]
    DownloadError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    #[error("Source fetch failed: {0}")]
    SourceFetchFailed(String),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

/// Failures that abort a single dependency resolution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Package not found in AUR: {name}")]
    NotFound { name: String },

    #[error("Circular dependency detected: {name}")]
    Cycle { name: String },

    #[error("Dependency not found anywhere: {dependency} (required by {required_by})")]
    Unresolvable {
        dependency: String,
        required_by: String,
    },

    #[error("Metadata lookup failed: {0}")]
    Metadata(String),
}
