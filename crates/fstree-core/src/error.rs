//! Error types for tree construction and scanning.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised by the tree primitives themselves.
///
/// These carry no path; the scanner attaches one with [`ScanError::tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TreeError {
    /// Name is empty, `.`, `..`, or contains a separator or NUL byte.
    #[error("invalid node name")]
    InvalidName,

    /// Could not grow a child collection.
    #[error("out of memory")]
    OutOfMemory,

    /// A symlink node was requested without a target.
    #[error("symlink has no target")]
    MissingLinkTarget,

    /// The node an operation needs to be a directory is not one.
    #[error("not a directory")]
    NotADirectory,
}

/// Fatal errors that abort a scan.
///
/// Every variant names the path it happened at.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Scan source or target node is not a directory.
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Symlink target length plus terminator does not fit in memory.
    #[error("Symlink target too long ({size} bytes): {path}")]
    SymlinkTooLong { path: PathBuf, size: u64 },

    /// Allocation failure while building the tree.
    #[error("Out of memory at {path}")]
    OutOfMemory { path: PathBuf },

    /// Entry name cannot be stored as a tree node.
    #[error("Invalid entry name: {path}")]
    InvalidName { path: PathBuf },

    /// The admission callback asked to abort the scan.
    #[error("Scan aborted by callback at {path}")]
    Aborted { path: PathBuf },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Attach a path to a tree primitive error.
    pub fn tree(path: impl Into<PathBuf>, error: TreeError) -> Self {
        let path = path.into();
        match error {
            TreeError::InvalidName => Self::InvalidName { path },
            TreeError::OutOfMemory => Self::OutOfMemory { path },
            TreeError::NotADirectory => Self::NotADirectory { path },
            TreeError::MissingLinkTarget => Self::Io {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    TreeError::MissingLinkTarget,
                ),
            },
        }
    }

    /// The path this error refers to, if it has one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::PermissionDenied { path }
            | Self::NotFound { path }
            | Self::Io { path, .. }
            | Self::NotADirectory { path }
            | Self::SymlinkTooLong { path, .. }
            | Self::OutOfMemory { path }
            | Self::InvalidName { path }
            | Self::Aborted { path } => Some(path),
            Self::InvalidConfig { .. } => None,
        }
    }

    /// Whether the scan was stopped by the admission callback.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}
