//! Model error types
//!
//! Declaration and write-path errors. Store failures bubble through
//! transparently; everything else here is a caller mistake that is reported
//! before any mutation lands.

use thiserror::Error;

use crate::store::StoreError;

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors from the model declaration layer and the instance write path
#[derive(Debug, Error)]
pub enum ModelError {
    /// Field name not declared on the model
    #[error("model '{model}' has no field '{field}'")]
    UnknownField { model: String, field: String },

    /// Same field declared twice
    #[error("field '{field}' is declared more than once")]
    DuplicateField { field: String },

    /// Field name collides with the primary key
    #[error("field name '{field}' is reserved for the primary key")]
    ReservedField { field: String },

    /// A record with this primary key already exists
    #[error("primary key '{pk}' already exists in '{namespace}'")]
    PkExists { namespace: String, pk: String },

    /// Primary key supplied to a model that allocates its own
    #[error("model '{model}' allocates primary keys, one cannot be supplied")]
    PkNotAssignable { model: String },

    /// Primary key missing for a model with an explicit pk policy
    #[error("model '{model}' requires an explicit primary key")]
    PkRequired { model: String },

    /// Non-scalar value given for a plain field (or a pk)
    #[error("field '{field}' expects a scalar value")]
    ScalarExpected { field: String },

    /// Non-object value given for a hash field
    #[error("field '{field}' expects an object of subkey values")]
    HashExpected { field: String },

    /// Hash operation on a plain field
    #[error("field '{field}' is not a hash field")]
    ExpectedHashField { field: String },

    /// Plain-value operation on a hash field
    #[error("field '{field}' is a hash field, use the hash operations")]
    ExpectedPlainField { field: String },

    /// Counter operation on a value that is not an integer
    #[error("field '{field}' holds '{value}', which is not an integer")]
    IntegerExpected { field: String, value: String },

    /// Store failure, surfaced unchanged
    #[error(transparent)]
    Store(#[from] StoreError),
}
