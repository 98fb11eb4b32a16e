//! Error Types
//!
//! Three families, one per layer:
//!
//! - [`CodecError`]: reading, writing and comparing encoded values
//! - [`ValueError`]: constructing or comparing in-memory values
//! - [`SchemaError`]: constructing schemas or parsing schema descriptions
//!
//! Malformed input is always reported to the caller. Contract violations
//! (schema mismatch, broken codec tables) are reported too, but
//! [`CodecError::is_recoverable`] tells the caller not to retry them.

use std::io;
use thiserror::Error;

use crate::value::LogicalType;

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    /// Underlying stream failure other than end-of-input
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// The stream ended in the middle of a value
    #[error("Truncated input: stream ended in the middle of a value")]
    Truncated,

    /// Tag does not name a known encoding
    #[error("Unknown encoding id: {0}")]
    UnknownEncoding(u64),

    /// Bytes were present but do not form a valid value
    #[error("Malformed input: {0}")]
    Malformed(String),

    /// A value handed to a schema-specialized writer does not fit the schema
    #[error("Schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    /// The value kind has no defined order
    #[error("Values of type {0} are not comparable")]
    NotComparable(LogicalType),

    /// Codec tables are incomplete or inconsistent
    #[error("Codec configuration error: {0}")]
    Config(String),
}

impl CodecError {
    /// Malformed-stream failures may be retried by the caller (the input may
    /// be re-fetched); everything else is a logic error upstream.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CodecError::Io(_)
                | CodecError::Truncated
                | CodecError::UnknownEncoding(_)
                | CodecError::Malformed(_)
        )
    }

    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        CodecError::SchemaMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::Truncated
        } else {
            CodecError::Io(err)
        }
    }
}

impl From<ValueError> for CodecError {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::NotComparable(t) => CodecError::NotComparable(t),
            other => CodecError::Malformed(other.to_string()),
        }
    }
}

impl From<SchemaError> for CodecError {
    fn from(err: SchemaError) -> Self {
        CodecError::Malformed(err.to_string())
    }
}

/// Value construction and comparison errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// Comparing or hashing a kind with no defined order
    #[error("Values of type {0} are not comparable")]
    NotComparable(LogicalType),

    /// Record field names must be unique
    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    /// Regex pattern or flags rejected
    #[error("Invalid regex: {0}")]
    InvalidRegex(String),

    /// Span end precedes its begin
    #[error("Invalid span: begin {begin} is after end {end}")]
    InvalidSpan { begin: i64, end: i64 },
}

/// Schema construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Lower bound is above upper bound
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    /// Record schema declares a field twice
    #[error("Duplicate field in record schema: {0}")]
    DuplicateField(String),

    /// Constant does not satisfy the other constraints of the schema
    #[error("Constant conflicts with schema: {0}")]
    ConstantConflict(String),

    /// String pattern does not compile
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// A value does not describe a schema
    #[error("Invalid schema description: {0}")]
    InvalidDescription(String),
}

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Result type for value operations
pub type ValueResult<T> = Result<T, ValueError>;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eof_maps_to_truncated() {
        let err: CodecError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, CodecError::Truncated));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_other_io_errors_keep_their_kind() {
        let err: CodecError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        match err {
            CodecError::Io(inner) => assert_eq!(inner.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_contract_violations_are_not_recoverable() {
        assert!(!CodecError::mismatch("long", "string").is_recoverable());
        assert!(!CodecError::NotComparable(LogicalType::Function).is_recoverable());
        assert!(!CodecError::Config("missing".into()).is_recoverable());
    }

    #[test]
    fn test_value_error_conversion() {
        let err: CodecError = ValueError::NotComparable(LogicalType::Function).into();
        assert!(matches!(err, CodecError::NotComparable(LogicalType::Function)));

        let err: CodecError = ValueError::DuplicateField("a".into()).into();
        assert!(matches!(err, CodecError::Malformed(_)));
    }

    #[test]
    fn test_error_display() {
        let err = CodecError::mismatch("long", "string");
        assert_eq!(err.to_string(), "Schema mismatch: expected long, found string");
        assert_eq!(
            CodecError::UnknownEncoding(42).to_string(),
            "Unknown encoding id: 42"
        );
    }
}
