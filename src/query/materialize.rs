//! Output modes and instance materialization
//!
//! A collection's output mode is a tagged variant picked when the caller
//! switches transforms; each variant owns its finalize step over the resolved
//! pk sequence. Instance materialization re-checks each pk against the
//! full-collection set unless the lazy flag waives it: stale index entries
//! (records deleted underneath their index) are silently dropped in checked
//! mode and passed through in lazy mode, by design trade-off.

use super::errors::QueryResult;
use super::results::{CollectionResults, ResultItem};
use crate::model::ModelSchema;
use crate::store::Store;

/// What a resolved collection hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Primary keys as stored
    #[default]
    Pks,
    /// Instance handles, existence-checked unless lazy
    Instances {
        /// Skip the per-pk existence test
        lazy: bool,
    },
}

impl OutputMode {
    /// True when instances are produced
    pub fn is_instances(&self) -> bool {
        matches!(self, OutputMode::Instances { .. })
    }

    /// Applies this mode's finalize step to a resolved pk sequence.
    pub(crate) fn finalize<'a, S: Store>(
        &self,
        schema: &'a ModelSchema,
        store: &'a S,
        pks: Vec<String>,
        truncate_at: usize,
    ) -> QueryResult<CollectionResults<'a, S>> {
        let items = match self {
            OutputMode::Pks => pks.into_iter().map(ResultItem::Pk).collect(),
            OutputMode::Instances { lazy } => {
                materialize(schema, store, pks, *lazy)?
                    .into_iter()
                    .map(ResultItem::Instance)
                    .collect()
            }
        };
        Ok(CollectionResults::new(items, truncate_at))
    }
}

/// Turns primary keys into instance handles.
///
/// Checked mode performs one membership test per pk and drops the ones that
/// fail; lazy mode constructs every handle unconditionally.
fn materialize<'a, S: Store>(
    schema: &'a ModelSchema,
    store: &'a S,
    pks: Vec<String>,
    lazy: bool,
) -> QueryResult<Vec<crate::model::Instance<'a, S>>> {
    let collection_key = schema.collection_key();
    let mut instances = Vec::with_capacity(pks.len());
    for pk in pks {
        if !lazy && !store.sismember(&collection_key, &pk)? {
            continue;
        }
        instances.push(schema.instance(store, pk));
    }
    Ok(instances)
}
