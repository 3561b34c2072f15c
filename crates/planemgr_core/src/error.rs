//! Central error type for planemgr core operations.

use thiserror::Error;

/// All failures surfaced by the core library.
#[derive(Debug, Error)]
pub enum PlanemgrError {
    /// No chart repository exists for the given id.
    #[error("chart not found: {0}")]
    ChartNotFound(String),

    /// A ref (hash, short hash, branch, HEAD) did not resolve to a commit.
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// A file path does not exist in the requested commit's tree.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// A version id did not resolve to a commit in the chart's history.
    #[error("version not found: {0}")]
    VersionNotFound(String),

    /// A repo-relative path was empty, absolute, or escaped the root.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A path collides with an existing tree entry of the other kind.
    #[error("path is a directory: {0}")]
    PathIsDirectory(String),

    /// Caller-supplied data failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Stored workspace data could not be decoded.
    #[error("corrupt workspace: {0}")]
    CorruptWorkspace(String),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Catch-all for failures with no more specific variant.
    #[error("{0}")]
    Internal(String),
}

/// Coarse classification used by transport layers to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Conflict,
    Internal,
}

impl PlanemgrError {
    /// Classify this error for callers that map failures to HTTP statuses.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlanemgrError::ChartNotFound(_)
            | PlanemgrError::RefNotFound(_)
            | PlanemgrError::FileNotFound(_)
            | PlanemgrError::VersionNotFound(_) => ErrorKind::NotFound,
            PlanemgrError::InvalidPath(_) | PlanemgrError::InvalidInput(_) => {
                ErrorKind::InvalidInput
            }
            PlanemgrError::PathIsDirectory(_) => ErrorKind::Conflict,
            PlanemgrError::CorruptWorkspace(_)
            | PlanemgrError::Git(_)
            | PlanemgrError::Io(_)
            | PlanemgrError::Encode(_)
            | PlanemgrError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PlanemgrError>;
