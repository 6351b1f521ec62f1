//! Query error types
//!
//! Two families, per the engine's propagation policy:
//!
//! - Configuration errors: a filter or sort path names something the model
//!   never declared, or the path shape does not fit the field's kind. Raised
//!   while the query is being built or planned, always before a store
//!   command is issued. Fatal to the query, fixed by the caller.
//! - Store errors: whatever the store reported, surfaced unchanged at
//!   resolution time. Never retried, never translated.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors from building and resolving collections
#[derive(Debug, Error)]
pub enum QueryError {
    /// Path names a declared field that is not indexable
    #[error("cannot filter on '{path}': field '{field}' is not indexable")]
    NotIndexable { path: String, field: String },

    /// Path names a field the model never declared
    #[error("cannot filter on '{path}': model '{model}' has no field '{field}'")]
    UnknownField {
        path: String,
        model: String,
        field: String,
    },

    /// Path shape does not fit the field's declared kind
    #[error("invalid field path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    /// Filter or sort value is not a scalar
    #[error("value for '{path}' must be a scalar")]
    ScalarExpected { path: String },

    /// Store failure, surfaced verbatim at resolution time
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueryError {
    /// True for errors the caller must fix in the query itself
    pub fn is_configuration(&self) -> bool {
        !matches!(self, QueryError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_split() {
        let config = QueryError::MalformedPath {
            path: "a__b__c".to_string(),
            reason: "too many segments".to_string(),
        };
        assert!(config.is_configuration());

        let store = QueryError::Store(StoreError::NotNumeric);
        assert!(!store.is_configuration());
    }

    #[test]
    fn test_store_error_message_untranslated() {
        let wrapped = QueryError::Store(StoreError::NotNumeric);
        assert_eq!(wrapped.to_string(), StoreError::NotNumeric.to_string());
    }
}
