//! Instance write path
//!
//! An [`Instance`] is a handle on one record: the schema, the store, and a
//! primary key. Field reads go straight to the record's storage keys; every
//! mutation keeps the secondary indexes in step (remove the old value before
//! the new one lands) and runs inside the store's atomic scope so readers
//! never observe a half-migrated index.

use std::fmt;

use serde_json::Value;

use super::errors::{ModelError, ModelResult};
use super::schema::{FieldKind, FieldSpec, ModelSchema, PkPolicy};
use crate::index::Index;
use crate::store::Store;

/// Prepared field writes for record creation, validated before any mutation.
enum PendingWrite {
    Plain {
        field: String,
        indexable: bool,
        value: String,
    },
    Hash {
        field: String,
        indexable: bool,
        entries: Vec<(String, String)>,
    },
}

impl ModelSchema {
    /// Creates a record and registers its pk in the full-collection set.
    ///
    /// Every supplied value is validated and serialized before the first
    /// store mutation; configuration mistakes never leave partial state.
    /// Field writes, index entries, and the collection membership land in
    /// one atomic scope.
    pub fn create<'a, S: Store>(
        &'a self,
        store: &'a S,
        values: &[(&str, Value)],
    ) -> ModelResult<Instance<'a, S>> {
        let mut explicit_pk: Option<String> = None;
        let mut writes: Vec<PendingWrite> = Vec::with_capacity(values.len());

        for (name, value) in values {
            if self.is_pk_name(name) {
                let serialized = self.serialize_scalar(name, value)?;
                if let Some(previous) = &explicit_pk {
                    if previous != &serialized {
                        return Err(ModelError::DuplicateField {
                            field: "pk".to_string(),
                        });
                    }
                }
                explicit_pk = Some(serialized);
                continue;
            }
            let spec = self.require_field(name)?;
            writes.push(prepare_write(self, spec, value)?);
        }

        let pk = match (self.pk_policy(), explicit_pk) {
            (PkPolicy::Auto, Some(_)) => {
                return Err(ModelError::PkNotAssignable {
                    model: self.namespace().to_string(),
                })
            }
            (PkPolicy::Auto, None) => store.incr(&self.max_pk_key())?.to_string(),
            (PkPolicy::Explicit, Some(pk)) => pk,
            (PkPolicy::Explicit, None) => {
                return Err(ModelError::PkRequired {
                    model: self.namespace().to_string(),
                })
            }
        };

        if store.sismember(&self.collection_key(), &pk)? {
            return Err(ModelError::PkExists {
                namespace: self.namespace().to_string(),
                pk,
            });
        }

        let collection_key = self.collection_key();
        store.atomically(&mut |tx| {
            tx.sadd(&collection_key, &pk)?;
            for write in &writes {
                match write {
                    PendingWrite::Plain {
                        field,
                        indexable,
                        value,
                    } => {
                        tx.set(&self.field_key(&pk, field), value)?;
                        if *indexable {
                            Index::plain(self, field.clone()).add(tx, value, &pk)?;
                        }
                    }
                    PendingWrite::Hash {
                        field,
                        indexable,
                        entries,
                    } => {
                        let key = self.field_key(&pk, field);
                        for (subkey, value) in entries {
                            tx.hset(&key, subkey, value)?;
                            if *indexable {
                                Index::hash(self, field.clone(), subkey.clone())
                                    .add(tx, value, &pk)?;
                            }
                        }
                    }
                }
            }
            Ok(())
        })?;

        Ok(Instance {
            schema: self,
            store,
            pk,
        })
    }

    /// Attaches a handle to a pk without checking that the record exists.
    ///
    /// Used by lazy materialization; call [`Instance::exists`] when the
    /// record's liveness matters.
    pub fn instance<'a, S: Store>(&'a self, store: &'a S, pk: impl Into<String>) -> Instance<'a, S> {
        Instance {
            schema: self,
            store,
            pk: pk.into(),
        }
    }
}

fn prepare_write(
    schema: &ModelSchema,
    spec: &FieldSpec,
    value: &Value,
) -> ModelResult<PendingWrite> {
    match spec.kind {
        FieldKind::Plain => Ok(PendingWrite::Plain {
            field: spec.name.clone(),
            indexable: spec.indexable,
            value: schema.serialize_scalar(&spec.name, value)?,
        }),
        FieldKind::Hash => {
            let Value::Object(map) = value else {
                return Err(ModelError::HashExpected {
                    field: spec.name.clone(),
                });
            };
            let mut entries = Vec::with_capacity(map.len());
            for (subkey, subvalue) in map {
                entries.push((subkey.clone(), schema.serialize_scalar(&spec.name, subvalue)?));
            }
            Ok(PendingWrite::Hash {
                field: spec.name.clone(),
                indexable: spec.indexable,
                entries,
            })
        }
    }
}

/// Handle on one stored record.
pub struct Instance<'a, S: Store> {
    schema: &'a ModelSchema,
    store: &'a S,
    pk: String,
}

impl<S: Store> Clone for Instance<'_, S> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema,
            store: self.store,
            pk: self.pk.clone(),
        }
    }
}

impl<S: Store> fmt::Debug for Instance<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("namespace", &self.schema.namespace())
            .field("pk", &self.pk)
            .finish()
    }
}

impl<S: Store> PartialEq for Instance<'_, S> {
    fn eq(&self, other: &Self) -> bool {
        self.schema.namespace() == other.schema.namespace() && self.pk == other.pk
    }
}

impl<'a, S: Store> Instance<'a, S> {
    /// The record's primary key
    pub fn pk(&self) -> &str {
        &self.pk
    }

    /// Membership test against the full-collection set
    pub fn exists(&self) -> ModelResult<bool> {
        Ok(self
            .store
            .sismember(&self.schema.collection_key(), &self.pk)?)
    }

    fn plain_field(&self, field: &str) -> ModelResult<&FieldSpec> {
        let spec = self.schema.require_field(field)?;
        if spec.kind != FieldKind::Plain {
            return Err(ModelError::ExpectedPlainField {
                field: field.to_string(),
            });
        }
        Ok(spec)
    }

    fn hash_spec(&self, field: &str) -> ModelResult<&FieldSpec> {
        let spec = self.schema.require_field(field)?;
        if spec.kind != FieldKind::Hash {
            return Err(ModelError::ExpectedHashField {
                field: field.to_string(),
            });
        }
        Ok(spec)
    }

    // ------------------------------------------------------------------
    // Plain fields
    // ------------------------------------------------------------------

    /// Reads a plain field's stored value
    pub fn get(&self, field: &str) -> ModelResult<Option<String>> {
        self.plain_field(field)?;
        Ok(self.store.get(&self.schema.field_key(&self.pk, field))?)
    }

    /// Writes a plain field, deindexing the previous value first
    pub fn set(&self, field: &str, value: &Value) -> ModelResult<()> {
        let spec = self.plain_field(field)?;
        let indexable = spec.indexable;
        let serialized = self.schema.serialize_scalar(field, value)?;
        let key = self.schema.field_key(&self.pk, field);
        let old = self.store.get(&key)?;
        let changed = old.as_deref() != Some(serialized.as_str());

        self.store.atomically(&mut |tx| {
            if indexable && changed {
                let index = Index::plain(self.schema, field);
                if let Some(old) = &old {
                    index.remove(tx, old, &self.pk)?;
                }
                index.add(tx, &serialized, &self.pk)?;
            }
            tx.set(&key, &serialized)
        })?;
        Ok(())
    }

    /// Deletes a field's storage and its index entries, either kind
    pub fn unset(&self, field: &str) -> ModelResult<()> {
        let spec = self.schema.require_field(field)?;
        let indexable = spec.indexable;
        let key = self.schema.field_key(&self.pk, field);
        match spec.kind {
            FieldKind::Plain => {
                let old = self.store.get(&key)?;
                self.store.atomically(&mut |tx| {
                    if indexable {
                        if let Some(old) = &old {
                            Index::plain(self.schema, field).remove(tx, old, &self.pk)?;
                        }
                    }
                    tx.del(&key)?;
                    Ok(())
                })?;
            }
            FieldKind::Hash => {
                let entries = self.store.hgetall(&key)?;
                self.store.atomically(&mut |tx| {
                    if indexable {
                        for (subkey, value) in &entries {
                            Index::hash(self.schema, field, subkey.clone())
                                .remove(tx, value, &self.pk)?;
                        }
                    }
                    tx.del(&key)?;
                    Ok(())
                })?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Hash fields
    // ------------------------------------------------------------------

    /// Sets one subkey, reindexing it when the value actually changes
    pub fn hset(&self, field: &str, subkey: &str, value: &Value) -> ModelResult<bool> {
        let spec = self.hash_spec(field)?;
        let indexable = spec.indexable;
        let serialized = self.schema.serialize_scalar(field, value)?;
        let key = self.schema.field_key(&self.pk, field);
        let old = self.store.hget(&key, subkey)?;
        if old.as_deref() == Some(serialized.as_str()) {
            return Ok(false);
        }

        let is_new = old.is_none();
        self.store.atomically(&mut |tx| {
            if indexable {
                let index = Index::hash(self.schema, field, subkey);
                if let Some(old) = &old {
                    index.remove(tx, old, &self.pk)?;
                }
                index.add(tx, &serialized, &self.pk)?;
            }
            tx.hset(&key, subkey, &serialized)?;
            Ok(())
        })?;
        Ok(is_new)
    }

    /// Sets one subkey only if it does not exist yet
    pub fn hsetnx(&self, field: &str, subkey: &str, value: &Value) -> ModelResult<bool> {
        self.hash_spec(field)?;
        let key = self.schema.field_key(&self.pk, field);
        if self.store.hexists(&key, subkey)? {
            return Ok(false);
        }
        self.hset(field, subkey, value)?;
        Ok(true)
    }

    /// Sets several subkeys in one atomic scope
    pub fn hmset(&self, field: &str, entries: &[(&str, Value)]) -> ModelResult<()> {
        let spec = self.hash_spec(field)?;
        let indexable = spec.indexable;
        let key = self.schema.field_key(&self.pk, field);

        let mut prepared: Vec<(String, String, Option<String>)> = Vec::with_capacity(entries.len());
        for (subkey, value) in entries {
            let serialized = self.schema.serialize_scalar(field, value)?;
            let old = self.store.hget(&key, subkey)?;
            prepared.push(((*subkey).to_string(), serialized, old));
        }

        self.store.atomically(&mut |tx| {
            for (subkey, serialized, old) in &prepared {
                if old.as_deref() == Some(serialized.as_str()) {
                    continue;
                }
                if indexable {
                    let index = Index::hash(self.schema, field, subkey.clone());
                    if let Some(old) = old {
                        index.remove(tx, old, &self.pk)?;
                    }
                    index.add(tx, serialized, &self.pk)?;
                }
                tx.hset(&key, subkey, serialized)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Reads one subkey
    pub fn hget(&self, field: &str, subkey: &str) -> ModelResult<Option<String>> {
        self.hash_spec(field)?;
        Ok(self
            .store
            .hget(&self.schema.field_key(&self.pk, field), subkey)?)
    }

    /// Reads several subkeys, preserving request order
    pub fn hmget(&self, field: &str, subkeys: &[&str]) -> ModelResult<Vec<Option<String>>> {
        self.hash_spec(field)?;
        let key = self.schema.field_key(&self.pk, field);
        let mut values = Vec::with_capacity(subkeys.len());
        for subkey in subkeys {
            values.push(self.store.hget(&key, subkey)?);
        }
        Ok(values)
    }

    /// All subkey/value pairs
    pub fn hgetall(&self, field: &str) -> ModelResult<Vec<(String, String)>> {
        self.hash_spec(field)?;
        Ok(self.store.hgetall(&self.schema.field_key(&self.pk, field))?)
    }

    /// All subkeys
    pub fn hkeys(&self, field: &str) -> ModelResult<Vec<String>> {
        self.hash_spec(field)?;
        Ok(self.store.hkeys(&self.schema.field_key(&self.pk, field))?)
    }

    /// All subkey values
    pub fn hvals(&self, field: &str) -> ModelResult<Vec<String>> {
        self.hash_spec(field)?;
        Ok(self.store.hvals(&self.schema.field_key(&self.pk, field))?)
    }

    /// Number of subkeys
    pub fn hlen(&self, field: &str) -> ModelResult<usize> {
        self.hash_spec(field)?;
        Ok(self.store.hlen(&self.schema.field_key(&self.pk, field))?)
    }

    /// Whether a subkey exists
    pub fn hexists(&self, field: &str, subkey: &str) -> ModelResult<bool> {
        self.hash_spec(field)?;
        Ok(self
            .store
            .hexists(&self.schema.field_key(&self.pk, field), subkey)?)
    }

    /// Subkey/value pairs whose subkey matches a glob pattern
    pub fn hscan(&self, field: &str, pattern: &str) -> ModelResult<Vec<(String, String)>> {
        self.hash_spec(field)?;
        Ok(self
            .store
            .hscan(&self.schema.field_key(&self.pk, field), pattern)?)
    }

    /// Deletes subkeys, deindexing present ones; absent subkeys are ignored.
    ///
    /// Returns the number of subkeys actually removed.
    pub fn hdel(&self, field: &str, subkeys: &[&str]) -> ModelResult<usize> {
        let spec = self.hash_spec(field)?;
        let indexable = spec.indexable;
        let key = self.schema.field_key(&self.pk, field);

        let mut present: Vec<(String, String)> = Vec::new();
        for subkey in subkeys {
            if let Some(value) = self.store.hget(&key, subkey)? {
                present.push(((*subkey).to_string(), value));
            }
        }

        let mut removed = 0;
        self.store.atomically(&mut |tx| {
            for (subkey, value) in &present {
                if indexable {
                    Index::hash(self.schema, field, subkey.clone())
                        .remove(tx, value, &self.pk)?;
                }
            }
            let fields: Vec<&str> = present.iter().map(|(subkey, _)| subkey.as_str()).collect();
            removed = tx.hdel(&key, &fields)?;
            Ok(())
        })?;
        Ok(removed)
    }

    /// Increments an integer subkey, reindexing old and new values
    pub fn hincrby(&self, field: &str, subkey: &str, delta: i64) -> ModelResult<i64> {
        let spec = self.hash_spec(field)?;
        let indexable = spec.indexable;
        let key = self.schema.field_key(&self.pk, field);
        let old = self.store.hget(&key, subkey)?;
        let current = match &old {
            None => 0,
            Some(raw) => raw.parse::<i64>().map_err(|_| ModelError::IntegerExpected {
                field: field.to_string(),
                value: raw.clone(),
            })?,
        };
        let next = current + delta;
        let serialized = next.to_string();

        self.store.atomically(&mut |tx| {
            if indexable {
                let index = Index::hash(self.schema, field, subkey);
                if let Some(old) = &old {
                    index.remove(tx, old, &self.pk)?;
                }
                index.add(tx, &serialized, &self.pk)?;
            }
            tx.hset(&key, subkey, &serialized)?;
            Ok(())
        })?;
        Ok(next)
    }

    // ------------------------------------------------------------------
    // Record lifecycle
    // ------------------------------------------------------------------

    /// Removes the record: every index entry, every field key, and the
    /// collection membership, in one atomic scope.
    pub fn delete(self) -> ModelResult<()> {
        enum Stored {
            Plain(Option<String>),
            Hash(Vec<(String, String)>),
        }

        let mut snapshot: Vec<(&FieldSpec, Stored)> = Vec::new();
        for spec in self.schema.fields() {
            let key = self.schema.field_key(&self.pk, &spec.name);
            let stored = match spec.kind {
                FieldKind::Plain => Stored::Plain(self.store.get(&key)?),
                FieldKind::Hash => Stored::Hash(self.store.hgetall(&key)?),
            };
            snapshot.push((spec, stored));
        }

        let collection_key = self.schema.collection_key();
        self.store.atomically(&mut |tx| {
            for (spec, stored) in &snapshot {
                let key = self.schema.field_key(&self.pk, &spec.name);
                match stored {
                    Stored::Plain(value) => {
                        if spec.indexable {
                            if let Some(value) = value {
                                Index::plain(self.schema, spec.name.clone())
                                    .remove(tx, value, &self.pk)?;
                            }
                        }
                        tx.del(&key)?;
                    }
                    Stored::Hash(entries) => {
                        if spec.indexable {
                            for (subkey, value) in entries {
                                Index::hash(self.schema, spec.name.clone(), subkey.clone())
                                    .remove(tx, value, &self.pk)?;
                            }
                        }
                        tx.del(&key)?;
                    }
                }
            }
            tx.srem(&collection_key, &self.pk)?;
            Ok(())
        })?;
        Ok(())
    }
}
