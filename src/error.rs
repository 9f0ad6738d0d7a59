//! Error taxonomy for the index and structured exit codes for the CLI.
//!
//! Library code returns [`Error`]. The binary wraps it in `anyhow` and maps
//! it onto an [`ExitCode`] when the process terminates.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error as ThisError;

use crate::thumbnail::ThumbnailError;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the index, the move operations and the reconciler.
///
/// Store corruption and filename collisions are recovered internally and
/// only reach callers when recovery itself failed.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The referenced file or ledger record does not exist.
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// Thumbnail generation failed for a file that exists.
    #[error(transparent)]
    Decode(#[from] ThumbnailError),

    /// The index database could not be used even after reinitializing it.
    #[error("index store unavailable: {0}")]
    StoreUnavailable(#[source] rusqlite::Error),

    /// The file already lives inside the quarantine area.
    #[error("already quarantined: {0}")]
    AlreadyQuarantined(PathBuf),

    /// Another reconciliation pass is currently running.
    #[error("reconciliation already in progress")]
    ReconcileInProgress,

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Classify an I/O error for `path`, turning `NotFound` into [`Error::NotFound`].
    pub(crate) fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Get the path associated with this error (if any).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::NotFound(p) | Self::AlreadyQuarantined(p) | Self::Io { path: p, .. } => Some(p),
            Self::Decode(e) => Some(e.path()),
            Self::StoreUnavailable(_) | Self::ReconcileInProgress => None,
        }
    }
}

/// Exit codes for the gallery-index binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the command completed.
    Success = 0,
    /// General error: an unexpected failure.
    GeneralError = 1,
    /// A referenced file or ledger record was missing.
    NotFound = 2,
    /// Thumbnail generation failed.
    DecodeFailed = 3,
    /// Another reconciliation was already running.
    Busy = 4,
    /// Interrupted: stopped by the user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "GI000",
            Self::GeneralError => "GI001",
            Self::NotFound => "GI002",
            Self::DecodeFailed => "GI003",
            Self::Busy => "GI004",
            Self::Interrupted => "GI130",
        }
    }

    /// Pick the exit code for an error bubbled up to `main`.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<Error>() {
            Some(Error::NotFound(_)) => Self::NotFound,
            Some(Error::Decode(_)) => Self::DecodeFailed,
            Some(Error::ReconcileInProgress) => Self::Busy,
            _ => Self::GeneralError,
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "GI002")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Path the error refers to, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: err.to_string(),
            path: err
                .downcast_ref::<Error>()
                .and_then(Error::path)
                .map(Path::to_path_buf),
        }
    }
}
