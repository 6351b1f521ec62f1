//! Filter-key planner
//!
//! Turns equality constraints into an execution plan over store keys. The
//! planner never touches the store: constraints are validated against the
//! schema and compiled to index keys at build time, and the resulting
//! [`FilterPlan`] is pure data the collection executes later.
//!
//! Plan selection:
//! 1. No constraints: the full-collection set.
//! 2. Contradictory pk constraints: the empty plan, no store access ever.
//! 3. Only a pk: a membership test against the full-collection set.
//! 4. One index constraint: that index key, reused directly.
//! 5. Several index constraints: an intersection of all participating keys.
//! 6. pk plus index constraints: membership of that one pk in each
//!    contributing key, short-circuiting the full intersection.

use serde::Serialize;

use super::errors::{QueryError, QueryResult};
use super::path::FieldPath;
use crate::index::Index;
use crate::model::{FieldKind, ModelSchema};

/// One validated equality constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// The path as written, for explain output
    pub path: String,
    /// What the constraint resolves against
    pub target: ConstraintTarget,
}

/// Resolution target of a constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintTarget {
    /// Direct test of one primary key
    Pk(String),
    /// Membership set of one indexed value
    IndexKey(String),
}

/// Compiles filter paths into constraints and constraints into plans.
pub struct FilterPlanner<'a> {
    schema: &'a ModelSchema,
}

impl<'a> FilterPlanner<'a> {
    /// Creates a planner for one model
    pub fn new(schema: &'a ModelSchema) -> Self {
        Self { schema }
    }

    /// Validates one `path = value` constraint.
    ///
    /// This is the configuration-error surface: unknown fields, non-indexable
    /// fields, and path shapes that do not fit the field's kind are all
    /// rejected here, before any store command.
    pub fn constraint(&self, path: &str, value: &serde_json::Value) -> QueryResult<Constraint> {
        let parsed = FieldPath::parse(path)?;
        let serialized = self
            .schema
            .serialize_scalar(&parsed.field, value)
            .map_err(|_| QueryError::ScalarExpected {
                path: path.to_string(),
            })?;

        if self.schema.is_pk_name(&parsed.field) {
            if parsed.subkey.is_some() {
                return Err(QueryError::MalformedPath {
                    path: path.to_string(),
                    reason: "the primary key takes no subkey".to_string(),
                });
            }
            return Ok(Constraint {
                path: path.to_string(),
                target: ConstraintTarget::Pk(serialized),
            });
        }

        let Some(spec) = self.schema.field(&parsed.field) else {
            return Err(QueryError::UnknownField {
                path: path.to_string(),
                model: self.schema.namespace().to_string(),
                field: parsed.field.clone(),
            });
        };

        let key = match (spec.kind, &parsed.subkey) {
            (FieldKind::Plain, None) => {
                Index::plain(self.schema, parsed.field.as_str()).key_for(&serialized)
            }
            (FieldKind::Plain, Some(_)) => {
                return Err(QueryError::MalformedPath {
                    path: path.to_string(),
                    reason: format!("field '{}' takes no subkey", parsed.field),
                })
            }
            (FieldKind::Hash, Some(subkey)) => {
                Index::hash(self.schema, parsed.field.as_str(), subkey.as_str()).key_for(&serialized)
            }
            (FieldKind::Hash, None) => {
                return Err(QueryError::MalformedPath {
                    path: path.to_string(),
                    reason: format!("hash field '{}' requires a subkey", parsed.field),
                })
            }
        };

        if !spec.indexable {
            return Err(QueryError::NotIndexable {
                path: path.to_string(),
                field: parsed.field,
            });
        }

        Ok(Constraint {
            path: path.to_string(),
            target: ConstraintTarget::IndexKey(key),
        })
    }

    /// Combines constraints into an execution plan.
    ///
    /// Constraint order is kept as given; AND of equalities is commutative,
    /// so the order is unobservable in results.
    pub fn plan(&self, constraints: &[Constraint]) -> FilterPlan {
        let mut pk: Option<String> = None;
        let mut keys: Vec<String> = Vec::new();

        for constraint in constraints {
            match &constraint.target {
                ConstraintTarget::Pk(value) => match &pk {
                    None => pk = Some(value.clone()),
                    Some(existing) if existing == value => {}
                    // Two different pks can never both hold
                    Some(_) => return FilterPlan::Nothing,
                },
                ConstraintTarget::IndexKey(key) => {
                    if !keys.contains(key) {
                        keys.push(key.clone());
                    }
                }
            }
        }

        match (pk, keys.len()) {
            (None, 0) => FilterPlan::All,
            (None, 1) => FilterPlan::SingleIndex {
                key: keys.into_iter().next().unwrap_or_default(),
            },
            (None, _) => FilterPlan::Intersection { keys },
            (Some(pk), 0) => FilterPlan::DirectPk { pk },
            (Some(pk), _) => FilterPlan::PkWithIndexes { pk, keys },
        }
    }
}

/// An execution plan over store keys. Pure data, nothing executed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterPlan {
    /// No constraints: the model's full-collection set
    All,
    /// Provably empty (contradictory pk constraints)
    Nothing,
    /// Exactly the pk constraint: one existence test
    DirectPk { pk: String },
    /// One index constraint: the index key itself
    SingleIndex { key: String },
    /// Several index constraints: intersect the participating keys
    Intersection { keys: Vec<String> },
    /// pk plus index constraints: membership of that pk in each key
    PkWithIndexes { pk: String, keys: Vec<String> },
}

impl FilterPlan {
    /// Short strategy tag for logs and explain output
    pub fn strategy(&self) -> &'static str {
        match self {
            FilterPlan::All => "ALL",
            FilterPlan::Nothing => "NOTHING",
            FilterPlan::DirectPk { .. } => "PK_DIRECT",
            FilterPlan::SingleIndex { .. } => "INDEX_SINGLE",
            FilterPlan::Intersection { .. } => "INDEX_INTERSECT",
            FilterPlan::PkWithIndexes { .. } => "PK_WITH_INDEXES",
        }
    }

    /// Store keys the plan reads, for explain output
    pub fn explain(&self, collection_key: &str) -> PlanExplain {
        let keys = match self {
            FilterPlan::All | FilterPlan::DirectPk { .. } => vec![collection_key.to_string()],
            FilterPlan::Nothing => Vec::new(),
            FilterPlan::SingleIndex { key } => vec![key.clone()],
            FilterPlan::Intersection { keys } | FilterPlan::PkWithIndexes { keys, .. } => {
                keys.clone()
            }
        };
        PlanExplain {
            strategy: self.strategy(),
            keys,
        }
    }
}

/// Serializable plan description
#[derive(Debug, Clone, Serialize)]
pub struct PlanExplain {
    /// Strategy tag
    pub strategy: &'static str,
    /// Store keys the plan reads
    pub keys: Vec<String>,
}
