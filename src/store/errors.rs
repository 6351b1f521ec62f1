//! Store error types
//!
//! Errors reported by the key-value engine itself. These surface to query
//! callers verbatim: the query layer wraps them without translating the
//! message, so the text here is the text a caller sees.

use std::fmt;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by the key-value store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Operation issued against a key holding another data type
    WrongType { key: String },

    /// SORT found a value that cannot be compared numerically
    NotNumeric,

    /// INCR on a value that is not an integer
    NotInteger { key: String },

    /// Malformed glob pattern given to a scan operation
    BadPattern { pattern: String },
}

impl StoreError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::WrongType { .. } => "WRONGTYPE",
            StoreError::NotNumeric => "NOT_NUMERIC",
            StoreError::NotInteger { .. } => "NOT_INTEGER",
            StoreError::BadPattern { .. } => "BAD_PATTERN",
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::WrongType { key } => write!(
                f,
                "WRONGTYPE Operation against key '{}' holding the wrong kind of value",
                key
            ),
            StoreError::NotNumeric => {
                write!(f, "One or more values can't be converted into double")
            }
            StoreError::NotInteger { key } => {
                write!(f, "value at key '{}' is not an integer or out of range", key)
            }
            StoreError::BadPattern { pattern } => {
                write!(f, "invalid scan pattern '{}'", pattern)
            }
        }
    }
}

impl std::error::Error for StoreError {}
