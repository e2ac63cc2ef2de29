//! Error types for the format crate.

use crate::header::FieldType;
use std::io;
use thiserror::Error;

/// Result type for format operations.
pub type FormatResult<T> = Result<T, FormatError>;

/// Errors raised while reading, writing, or validating ODB files.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The preamble (magic tag and byte-order constant) does not match.
    #[error("invalid odb file")]
    InvalidPreamble,

    /// An input's header differs from the first input's header.
    #[error("field spec mismatch: {name}")]
    SchemaMismatch {
        /// Display name of the offending input.
        name: String,
    },

    /// The header is structurally invalid.
    #[error("invalid header: {message}")]
    InvalidHeader {
        /// Description of the problem.
        message: String,
    },

    /// A field spec could not be created.
    #[error("invalid field spec: {message}")]
    InvalidFieldSpec {
        /// Description of the problem.
        message: String,
    },

    /// A stream ended in the middle of a header or record.
    #[error("unexpected eof {context}")]
    UnexpectedEof {
        /// Which input or structure was truncated.
        context: String,
    },

    /// A value does not match the type of the field it is stored in.
    #[error("type mismatch for field {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Field name.
        field: String,
        /// Declared field type.
        expected: FieldType,
        /// Type of the supplied value.
        actual: FieldType,
    },

    /// I/O error while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FormatError {
    /// Create a schema mismatch error naming the input.
    pub fn schema_mismatch(name: impl Into<String>) -> Self {
        Self::SchemaMismatch { name: name.into() }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an invalid field spec error.
    pub fn invalid_field_spec(message: impl Into<String>) -> Self {
        Self::InvalidFieldSpec {
            message: message.into(),
        }
    }

    /// Create an unexpected EOF error.
    pub fn unexpected_eof(context: impl Into<String>) -> Self {
        Self::UnexpectedEof {
            context: context.into(),
        }
    }

    /// Maps a short read to [`FormatError::UnexpectedEof`], keeping other I/O
    /// errors as they are.
    pub fn from_read(err: io::Error, context: impl Into<String>) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::unexpected_eof(context)
        } else {
            Self::Io(err)
        }
    }
}
