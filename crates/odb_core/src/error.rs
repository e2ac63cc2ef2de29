//! Error types for ODB core.

use odb_format::FormatError;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in ODB core operations.
///
/// Every operation fails fast: there is no retry and no partial result.
#[derive(Debug, Error)]
pub enum CoreError {
    /// File access error (open, lock, map, seek).
    #[error(transparent)]
    Storage(#[from] odb_storage::StorageError),

    /// Header, layout, or record-stream error.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A string is not in the dictionary.
    #[error("unexpected string: {value}")]
    UnknownString {
        /// The string that was looked up (lossy UTF-8).
        value: String,
    },

    /// A dictionary index is outside `[0, count)`.
    #[error("invalid string index: {index} (dictionary holds {count} strings)")]
    StringIndexOutOfRange {
        /// The requested index.
        index: i64,
        /// Number of strings in the dictionary.
        count: u64,
    },

    /// Dictionary input contains the same string twice in a row.
    #[error("strings not unique: {key}")]
    DuplicateKey {
        /// The repeated string (lossy UTF-8).
        key: String,
    },

    /// A dictionary file is internally inconsistent.
    #[error("corrupted dictionary: {message}")]
    Corrupted {
        /// Description of the inconsistency.
        message: String,
    },

    /// No perfect hash could be found for the key set.
    #[error("error generating hash: no perfect hash for {keys} keys after {attempts} attempts")]
    HashConstruction {
        /// Number of keys.
        keys: usize,
        /// Number of seeds tried.
        attempts: u32,
    },

    /// Caller-supplied argument is invalid.
    #[error("{message}")]
    InvalidInput {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an unknown-string error.
    pub fn unknown_string(value: &[u8]) -> Self {
        Self::UnknownString {
            value: String::from_utf8_lossy(value).into_owned(),
        }
    }

    /// Creates a duplicate-key error.
    pub fn duplicate_key(key: &[u8]) -> Self {
        Self::DuplicateKey {
            key: String::from_utf8_lossy(key).into_owned(),
        }
    }

    /// Creates a corrupted-dictionary error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an unexpected EOF error naming the truncated input.
    pub fn unexpected_eof(context: impl Into<String>) -> Self {
        Self::Format(FormatError::unexpected_eof(context))
    }

    /// Returns true if this is an unexpected end of a header or record.
    #[must_use]
    pub fn is_unexpected_eof(&self) -> bool {
        matches!(self, Self::Format(FormatError::UnexpectedEof { .. }))
    }
}
