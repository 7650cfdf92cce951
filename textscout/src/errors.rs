//! Error types for textscout.
//!
//! Every fallible operation in the crate returns [`SearchResult`]. The variants map onto a
//! small taxonomy ([`ErrorKind`]) that consumers use to decide how to present a failure:
//!
//! ```rust,ignore
//! match Query::new(root, "log", "error") {
//!     Ok(query) => // start a search,
//!     Err(e) if e.kind() == ErrorKind::InvalidRoot => // ask for another directory,
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```
//!
//! Validation errors (`InvalidRoot`, `InvalidExtension`, `EmptyQuery`) are produced
//! synchronously before any work starts. `Cancelled` and `WorkerFault` only come out of a
//! running scan or task. Per-file read problems during a scan are logged and skipped rather
//! than surfaced, so `ReadError` and `EncodingError` reach callers only from single-file
//! operations such as rendering.
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur while searching, shaping or rendering
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Root folder must be an executable directory: {0}")]
    InvalidRoot(PathBuf),
    #[error("Extension is incorrect: {0:?}")]
    InvalidExtension(String),
    #[error("Search text must not be empty")]
    EmptyQuery,
    #[error("Path {path} is not under root {root}")]
    PathOutsideRoot { path: PathBuf, root: PathBuf },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid UTF-8 in file {path}: {source}")]
    EncodingError {
        path: PathBuf,
        source: std::str::Utf8Error,
    },
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Worker fault: {0}")]
    WorkerFault(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Coarse classification of a [`SearchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRoot,
    InvalidExtension,
    EmptyQuery,
    PathOutsideRoot,
    IoFailure,
    Cancelled,
    WorkerFault,
    Config,
}

/// Canonicalize the path and strip UNC prefixes so that
/// comparisons on Windows are consistent.
pub fn unify_path(original: &Path) -> PathBuf {
    let canonical = original
        .canonicalize()
        .unwrap_or_else(|_| original.to_path_buf());
    strip_unc_prefix(&canonical)
}

/// Strips the Windows UNC prefix (\\?\) from a path if present
fn strip_unc_prefix(p: &Path) -> PathBuf {
    let s = p.display().to_string();
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        PathBuf::from(stripped)
    } else {
        p.to_path_buf()
    }
}

impl SearchError {
    pub fn invalid_root(path: impl Into<PathBuf>) -> Self {
        Self::InvalidRoot(path.into())
    }

    pub fn invalid_extension(extension: impl Into<String>) -> Self {
        Self::InvalidExtension(extension.into())
    }

    pub fn path_outside_root(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self::PathOutsideRoot {
            path: path.into(),
            root: root.into(),
        }
    }

    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    pub fn encoding_error(path: impl Into<PathBuf>, source: std::str::Utf8Error) -> Self {
        let path = path.into();
        let unified = unify_path(&path);
        Self::EncodingError {
            path: unified,
            source,
        }
    }

    pub fn worker_fault(msg: impl Into<String>) -> Self {
        Self::WorkerFault(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Returns the taxonomy entry this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRoot(_) => ErrorKind::InvalidRoot,
            Self::InvalidExtension(_) => ErrorKind::InvalidExtension,
            Self::EmptyQuery => ErrorKind::EmptyQuery,
            Self::PathOutsideRoot { .. } => ErrorKind::PathOutsideRoot,
            Self::IoError(_) | Self::ReadError { .. } | Self::EncodingError { .. } => {
                ErrorKind::IoFailure
            }
            Self::Cancelled => ErrorKind::Cancelled,
            Self::WorkerFault(_) => ErrorKind::WorkerFault,
            Self::ConfigError(_) => ErrorKind::Config,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<config::ConfigError> for SearchError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

/// Extracts a readable message from a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
