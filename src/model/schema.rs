//! Model declaration layer
//!
//! A [`ModelSchema`] names a model's storage namespace, declares its fields
//! (plain string or hash, indexable or not), fixes the primary-key policy,
//! and owns every key-construction rule: the full-collection set, per-record
//! field storage, sort BY patterns, and temporary computation keys. The
//! query and index layers never build a key themselves.

use serde_json::Value;
use uuid::Uuid;

use super::errors::{ModelError, ModelResult};
use crate::config::Config;

/// Storage shape of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// One scalar value per record, stored under its own key
    Plain,
    /// A subkey -> value mapping per record, stored as a hash
    Hash,
}

/// One declared field of a model
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field name as used in filter paths
    pub name: String,
    /// Plain scalar or hash
    pub kind: FieldKind,
    /// Whether value changes are mirrored into an index
    pub indexable: bool,
}

/// How primary keys come into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkPolicy {
    /// Allocated from the model's counter at create time
    Auto,
    /// Supplied by the caller at create time
    Explicit,
}

/// Declaration of one model: namespace, fields, pk policy.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    namespace: String,
    fields: Vec<FieldSpec>,
    pk_policy: PkPolicy,
    pk_name: Option<String>,
    config: Config,
}

impl ModelSchema {
    /// Starts declaring a model under the given namespace
    pub fn builder(namespace: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            namespace: namespace.into(),
            fields: Vec::new(),
            pk_policy: PkPolicy::Auto,
            pk_name: None,
            config: Config::default(),
        }
    }

    /// The model's storage namespace
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Declared fields, in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks up a declared field
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Looks up a declared field, erroring with the model name on miss
    pub fn require_field(&self, name: &str) -> ModelResult<&FieldSpec> {
        self.field(name).ok_or_else(|| ModelError::UnknownField {
            model: self.namespace.clone(),
            field: name.to_string(),
        })
    }

    /// The primary-key policy
    pub fn pk_policy(&self) -> PkPolicy {
        self.pk_policy
    }

    /// The declared pk alias, if any (`pk` always works)
    pub fn pk_name(&self) -> Option<&str> {
        self.pk_name.as_deref()
    }

    /// True when `name` addresses the primary key.
    ///
    /// Only an exact bare-field match counts; sub-paths never resolve to the
    /// pk even when their base segment equals the alias.
    pub fn is_pk_name(&self, name: &str) -> bool {
        name == "pk" || self.pk_name.as_deref() == Some(name)
    }

    /// Engine configuration attached to this model
    pub fn config(&self) -> Config {
        self.config
    }

    // ------------------------------------------------------------------
    // Key construction
    // ------------------------------------------------------------------

    /// The set of all live primary keys
    pub fn collection_key(&self) -> String {
        format!("{}:collection", self.namespace)
    }

    /// Counter key for auto-allocated primary keys
    pub fn max_pk_key(&self) -> String {
        format!("{}:max_pk", self.namespace)
    }

    /// Storage key for one record's field
    pub fn field_key(&self, pk: &str, field: &str) -> String {
        format!("{}:{}:{}", self.namespace, pk, field)
    }

    /// SORT BY pattern addressing a field's storage location
    pub fn by_pattern(&self, field: &str, subkey: Option<&str>) -> String {
        match subkey {
            Some(subkey) => format!("{}:*:{}->{}", self.namespace, field, subkey),
            None => format!("{}:*:{}", self.namespace, field),
        }
    }

    /// A fresh, collision-free temporary computation key
    pub fn temp_key(&self) -> String {
        format!("{}:tmp:{}", self.namespace, Uuid::new_v4().simple())
    }

    // ------------------------------------------------------------------
    // Value serialization
    // ------------------------------------------------------------------

    /// Serializes a scalar to the store's string representation.
    ///
    /// Strings pass through, numbers use their canonical rendering, booleans
    /// become `1`/`0`. Anything else is rejected before touching the store.
    pub fn serialize_scalar(&self, field: &str, value: &Value) -> ModelResult<String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(true) => Ok("1".to_string()),
            Value::Bool(false) => Ok("0".to_string()),
            _ => Err(ModelError::ScalarExpected {
                field: field.to_string(),
            }),
        }
    }
}

/// Builder for [`ModelSchema`]
pub struct SchemaBuilder {
    namespace: String,
    fields: Vec<FieldSpec>,
    pk_policy: PkPolicy,
    pk_name: Option<String>,
    config: Config,
}

impl SchemaBuilder {
    /// Declares a plain scalar field
    pub fn field(mut self, name: impl Into<String>, indexable: bool) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind: FieldKind::Plain,
            indexable,
        });
        self
    }

    /// Declares a hash field (indexable per subkey)
    pub fn hash_field(mut self, name: impl Into<String>, indexable: bool) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            kind: FieldKind::Hash,
            indexable,
        });
        self
    }

    /// Names the primary key so filters can address it as a field
    pub fn pk_name(mut self, name: impl Into<String>) -> Self {
        self.pk_name = Some(name.into());
        self
    }

    /// Requires callers to supply primary keys instead of auto-allocating
    pub fn explicit_pk(mut self) -> Self {
        self.pk_policy = PkPolicy::Explicit;
        self
    }

    /// Attaches a non-default engine configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Validates the declaration and produces the schema
    pub fn build(self) -> ModelResult<ModelSchema> {
        let mut seen: Vec<&str> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.name == "pk" || self.pk_name.as_deref() == Some(field.name.as_str()) {
                return Err(ModelError::ReservedField {
                    field: field.name.clone(),
                });
            }
            if seen.contains(&field.name.as_str()) {
                return Err(ModelError::DuplicateField {
                    field: field.name.clone(),
                });
            }
            seen.push(&field.name);
        }
        Ok(ModelSchema {
            namespace: self.namespace,
            fields: self.fields,
            pk_policy: self.pk_policy,
            pk_name: self.pk_name,
            config: self.config,
        })
    }
}
