//! Sort execution
//!
//! Runs a sort request against a resolved filter plan. Plans that already
//! name a concrete key (an index key or the full-collection set) are sorted
//! in place with a BY pattern addressing the target field's storage; plans
//! that need a computed set go through a temporary key that is expired as a
//! leak guard and deleted on every exit path, the SORT's failure included.
//!
//! Sorting by the primary key (or with no BY path at all) compares the
//! members themselves, numerically unless the alpha flag says otherwise.
//! Nothing is validated when the sort is requested; a bad sort surfaces
//! only here, at resolution.

use super::errors::{QueryError, QueryResult};
use super::path::FieldPath;
use super::planner::FilterPlan;
use crate::model::{FieldKind, ModelSchema};
use crate::observability::{Logger, Severity};
use crate::store::{SortLimit, SortRequest, Store};

/// A sort request as the caller states it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOptions {
    /// Field path to sort by; a `-` prefix flips the direction. None (or the
    /// pk alias) sorts the primary keys themselves.
    pub by: Option<String>,
    /// Descending order
    pub desc: bool,
    /// Lexical comparison instead of the numeric default
    pub alpha: bool,
}

impl SortOptions {
    /// Numeric ascending sort by primary key
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts by a field path (`-` prefix for descending)
    pub fn by(mut self, path: impl Into<String>) -> Self {
        self.by = Some(path.into());
        self
    }

    /// Flips to descending order
    pub fn descending(mut self) -> Self {
        self.desc = true;
        self
    }

    /// Switches to lexical comparison
    pub fn alphabetic(mut self) -> Self {
        self.alpha = true;
        self
    }
}

/// Exclusive handle on a temporary computation key.
///
/// Created with the intersection already stored and the safety expiration
/// set. The key is deleted when the handle is released; if the happy path is
/// never reached, Drop deletes it anyway, and the expiration bounds leakage
/// should the process die first.
pub(crate) struct TempKey<'a, S: Store> {
    store: &'a S,
    key: String,
    released: bool,
}

impl<'a, S: Store> TempKey<'a, S> {
    /// Stores the intersection of `sources` under a fresh key.
    ///
    /// Returns the handle and the intersection's cardinality.
    pub(crate) fn create(
        store: &'a S,
        schema: &ModelSchema,
        sources: &[String],
    ) -> QueryResult<(Self, usize)> {
        let key = schema.temp_key();
        let count = store.sinterstore(&key, sources)?;
        store.expire(&key, schema.config().temp_key_ttl_secs)?;
        Logger::log(Severity::Trace, "query.temp_key.create", &[("key", key.as_str())]);
        Ok((
            Self {
                store,
                key,
                released: false,
            },
            count,
        ))
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    /// Deletes the key, reporting the store's answer
    pub(crate) fn release(mut self) -> QueryResult<()> {
        self.released = true;
        self.store.del(&self.key)?;
        Logger::log(Severity::Trace, "query.temp_key.release", &[("key", self.key.as_str())]);
        Ok(())
    }
}

impl<S: Store> Drop for TempKey<'_, S> {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.store.del(&self.key);
        }
    }
}

/// Executes a sort over a filter plan.
///
/// `window` is a slice already known to have non-negative bounds, pushed
/// down into the SORT itself.
pub(crate) fn execute<S: Store>(
    schema: &ModelSchema,
    store: &S,
    plan: &FilterPlan,
    options: &SortOptions,
    window: Option<SortLimit>,
) -> QueryResult<Vec<String>> {
    let request = build_request(schema, options, window)?;

    match plan {
        FilterPlan::Nothing => Ok(Vec::new()),
        FilterPlan::DirectPk { pk } => {
            let mut hits = Vec::new();
            if store.sismember(&schema.collection_key(), pk)? {
                hits.push(pk.clone());
            }
            Ok(apply_window(hits, window))
        }
        FilterPlan::PkWithIndexes { pk, keys } => {
            for key in keys {
                if !store.sismember(key, pk)? {
                    return Ok(Vec::new());
                }
            }
            Ok(apply_window(vec![pk.clone()], window))
        }
        FilterPlan::All => Ok(store.sort(&schema.collection_key(), &request)?),
        FilterPlan::SingleIndex { key } => Ok(store.sort(key, &request)?),
        FilterPlan::Intersection { keys } => {
            let (temp, _count) = TempKey::create(store, schema, keys)?;
            let sorted = store.sort(temp.key(), &request);
            let released = temp.release();
            let sorted = sorted?;
            released?;
            Ok(sorted)
        }
    }
}

/// Resolves the caller's sort options into a store request.
fn build_request(
    schema: &ModelSchema,
    options: &SortOptions,
    window: Option<SortLimit>,
) -> QueryResult<SortRequest> {
    let mut desc = options.desc;
    let mut by = None;

    if let Some(raw) = &options.by {
        let path_str = match raw.strip_prefix('-') {
            Some(stripped) => {
                desc = true;
                stripped
            }
            None => raw.as_str(),
        };
        let parsed = FieldPath::parse(path_str)?;
        if parsed.explicit_eq {
            return Err(QueryError::MalformedPath {
                path: raw.clone(),
                reason: "sort paths take no operator suffix".to_string(),
            });
        }

        // The pk alias sorts the members themselves, same as no BY at all.
        if !(schema.is_pk_name(&parsed.field) && parsed.subkey.is_none()) {
            let Some(spec) = schema.field(&parsed.field) else {
                return Err(QueryError::UnknownField {
                    path: raw.clone(),
                    model: schema.namespace().to_string(),
                    field: parsed.field.clone(),
                });
            };
            by = match (spec.kind, &parsed.subkey) {
                (FieldKind::Plain, None) => Some(schema.by_pattern(&parsed.field, None)),
                (FieldKind::Hash, Some(subkey)) => {
                    Some(schema.by_pattern(&parsed.field, Some(subkey)))
                }
                (FieldKind::Plain, Some(_)) => {
                    return Err(QueryError::MalformedPath {
                        path: raw.clone(),
                        reason: format!("field '{}' takes no subkey", parsed.field),
                    })
                }
                (FieldKind::Hash, None) => {
                    return Err(QueryError::MalformedPath {
                        path: raw.clone(),
                        reason: format!("hash field '{}' requires a subkey", parsed.field),
                    })
                }
            };
        }
    }

    Ok(SortRequest {
        by,
        desc,
        alpha: options.alpha,
        limit: window,
    })
}

fn apply_window(hits: Vec<String>, window: Option<SortLimit>) -> Vec<String> {
    let Some(SortLimit { offset, count }) = window else {
        return hits;
    };
    if offset >= hits.len() {
        return Vec::new();
    }
    let end = match count {
        Some(count) => (offset + count).min(hits.len()),
        None => hits.len(),
    };
    hits[offset..end].to_vec()
}
