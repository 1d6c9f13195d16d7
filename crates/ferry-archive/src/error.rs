//! Error types for archive creation, extraction and verification.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for archive operations.
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Errors that abort an archive operation.
///
/// Verification findings (checksum mismatches, missing segments) are not
/// errors; they are reported through [`crate::verify::VerifyStatus`].
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The requested extension does not map to a known codec.
    #[error("unsupported archive format: '{extension}'")]
    UnsupportedFormat { extension: String },

    /// The source root is missing or unreadable.
    #[error("source path {}: {source}", path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Creating, writing or closing a segment or manifest file failed.
    #[error("{operation} {}: {source}", path.display())]
    Io {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Tree traversal failed partway through.
    #[error("walking {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The checksum manifest could not be parsed.
    #[error("manifest {} line {line}: {reason}", path.display())]
    Manifest {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Caller supplied options that cannot drive an archive operation.
    #[error("invalid archive options: {reason}")]
    InvalidOptions { reason: String },
}

impl ArchiveError {
    pub(crate) fn io(
        path: impl Into<PathBuf>,
        operation: &'static str,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            path: path.into(),
            operation,
            source,
        }
    }

    pub(crate) fn walk(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Walk {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this is a walk failure (permission, vanished entry).
    pub fn is_walk(&self) -> bool {
        matches!(self, Self::Walk { .. })
    }

    /// Returns true if this error was raised before any output was produced.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. } | Self::Path { .. } | Self::InvalidOptions { .. }
        )
    }

    /// No archive error is retried by the engine; the caller decides.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Suggested exit code for a CLI front end.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnsupportedFormat { .. } | Self::InvalidOptions { .. } => 2,
            Self::Path { .. } => 3,
            Self::Walk { .. } => 4,
            Self::Manifest { .. } => 5,
            Self::Io { .. } => 1,
        }
    }
}
