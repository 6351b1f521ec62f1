//! Secondary index for keeldb
//!
//! One [`Index`] covers one field (or one hash subkey) of one model and maps
//! each observed value to the set of primary keys currently holding it.
//! Membership sets have no independent lifecycle: the store prunes a value's
//! set when its last member leaves, and the first `add` recreates it.
//!
//! Invariant: a pk sits under a value's set exactly while the live attribute
//! holds that value. The write path enforces this by removing the old value
//! before indexing the new one, inside one atomic scope.

use crate::model::ModelSchema;
use crate::store::{StoreResult, StoreWrite};

/// Index handle for one (field[, subkey]) of one model.
#[derive(Debug, Clone)]
pub struct Index<'a> {
    schema: &'a ModelSchema,
    field: String,
    subkey: Option<String>,
}

impl<'a> Index<'a> {
    /// Index over a plain field
    pub fn plain(schema: &'a ModelSchema, field: impl Into<String>) -> Self {
        Self {
            schema,
            field: field.into(),
            subkey: None,
        }
    }

    /// Index over one subkey of a hash field
    pub fn hash(
        schema: &'a ModelSchema,
        field: impl Into<String>,
        subkey: impl Into<String>,
    ) -> Self {
        Self {
            schema,
            field: field.into(),
            subkey: Some(subkey.into()),
        }
    }

    /// Store key of the membership set for `value`.
    ///
    /// Pure key construction, nothing is executed. The planner composes
    /// these keys into intersection plans without touching the store.
    pub fn key_for(&self, value: &str) -> String {
        match &self.subkey {
            Some(subkey) => format!(
                "{}:{}:{}:{}",
                self.schema.namespace(),
                self.field,
                subkey,
                value
            ),
            None => format!("{}:{}:{}", self.schema.namespace(), self.field, value),
        }
    }

    /// Adds `pk` to the membership set for `value`. Idempotent.
    pub fn add(&self, tx: &mut dyn StoreWrite, value: &str, pk: &str) -> StoreResult<()> {
        tx.sadd(&self.key_for(value), pk)?;
        Ok(())
    }

    /// Removes `pk` from the membership set for `value`. No error if absent.
    pub fn remove(&self, tx: &mut dyn StoreWrite, value: &str, pk: &str) -> StoreResult<()> {
        tx.srem(&self.key_for(value), pk)?;
        Ok(())
    }
}
