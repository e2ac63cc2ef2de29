//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An operation on a named file failed.
    #[error("error {operation} {}: {source}", path.display())]
    File {
        /// What was being attempted ("opening", "locking", "mapping", ...).
        operation: &'static str,
        /// The file involved.
        path: PathBuf,
        /// The system-level error.
        #[source]
        source: io::Error,
    },

    /// The operation needs random access but the input is a stream.
    #[error("{name} is not seekable")]
    NotSeekable {
        /// Display name of the input.
        name: String,
    },
}

impl StorageError {
    /// Creates a file error for the given operation and path.
    pub fn file(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::File {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Creates a not-seekable error for the named input.
    pub fn not_seekable(name: impl Into<String>) -> Self {
        Self::NotSeekable { name: name.into() }
    }
}
