//! Lazy collections
//!
//! A [`Collection`] accumulates filter constraints, a sort request, an
//! output mode, and a pending slice, and touches the store only when it is
//! observed. The resolution is cached and replayed until a mutating call
//! (new filter, new sort, new output mode) invalidates it; slicing is a view
//! over the cached resolution and never invalidates anything.
//!
//! Length queries go through cardinality primitives on the most selective
//! key instead of materializing, and never trigger a SORT; an invalid sort
//! therefore fails on the first real materialization, not on `len`.

use serde_json::Value;

use super::errors::QueryResult;
use super::materialize::OutputMode;
use super::planner::{Constraint, FilterPlan, FilterPlanner, PlanExplain};
use super::results::{CollectionResults, ResultItem};
use super::sorter::{self, SortOptions, TempKey};
use crate::config::Config;
use crate::model::ModelSchema;
use crate::observability::{Logger, Severity};
use crate::store::{SortLimit, Store};

/// Half-open slice bounds, negatives resolved against the realized length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    /// First position, negative counts from the end
    pub start: i64,
    /// One past the last position; None runs to the end
    pub stop: Option<i64>,
}

impl Slice {
    /// Both bounds known non-negative, so the window can push down into SORT
    fn non_negative(&self) -> bool {
        self.start >= 0 && self.stop.map_or(true, |stop| stop >= 0)
    }

    /// Offset/count form for SORT pushdown; only valid when non-negative
    fn to_limit(&self) -> SortLimit {
        let offset = self.start as usize;
        SortLimit {
            offset,
            count: self.stop.map(|stop| (stop as usize).saturating_sub(offset)),
        }
    }

    /// Applies the bounds to a realized sequence
    fn apply(&self, items: &[String]) -> Vec<String> {
        let len = items.len() as i64;
        let clamp = |position: i64| -> i64 {
            if position < 0 {
                (len + position).max(0)
            } else {
                position.min(len)
            }
        };
        let start = clamp(self.start);
        let stop = self.stop.map(clamp).unwrap_or(len);
        if stop <= start {
            Vec::new()
        } else {
            items[start as usize..stop as usize].to_vec()
        }
    }

    /// Length the bounds would select out of `base` elements
    fn window_len(&self, base: usize) -> usize {
        let len = base as i64;
        let clamp = |position: i64| -> i64 {
            if position < 0 {
                (len + position).max(0)
            } else {
                position.min(len)
            }
        };
        let start = clamp(self.start);
        let stop = self.stop.map(clamp).unwrap_or(len);
        (stop - start).max(0) as usize
    }
}

/// Cached resolution state
enum Cache {
    /// Nothing resolved for the current filter/sort/output combination
    Empty,
    /// The full unsliced sequence
    Full(Vec<String>),
    /// One sorted window, produced by SORT pushdown
    Window(Slice, Vec<String>),
}

/// Alternate query manager: contributes base constraints merged before the
/// caller's own, per call. No global state is involved; every entry point
/// invocation performs its own merge.
pub trait Manager {
    /// Constraints applied before any caller-supplied filter
    fn base_filters(&self) -> Vec<(String, Value)>;
}

/// The default manager applies no base constraints.
pub struct DefaultManager;

impl Manager for DefaultManager {
    fn base_filters(&self) -> Vec<(String, Value)> {
        Vec::new()
    }
}

impl ModelSchema {
    /// The model's collection: every live pk until filtered down
    pub fn collection<'a, S: Store>(&'a self, store: &'a S) -> Collection<'a, S> {
        Collection::new(self, store)
    }

    /// Collection entry through an alternate manager.
    ///
    /// The manager's base filters are validated and merged immediately, so a
    /// misdeclared base constraint fails here, before any store access.
    pub fn collection_via<'a, S: Store, M: Manager>(
        &'a self,
        store: &'a S,
        manager: &M,
    ) -> QueryResult<Collection<'a, S>> {
        let mut collection = Collection::new(self, store);
        for (path, value) in manager.base_filters() {
            collection = collection.filter(&path, value)?;
        }
        Ok(collection)
    }
}

/// A lazy, filterable, sortable, sliceable query over one model.
pub struct Collection<'a, S: Store> {
    schema: &'a ModelSchema,
    store: &'a S,
    config: Config,
    constraints: Vec<Constraint>,
    sort: Option<SortOptions>,
    output: OutputMode,
    pending_slice: Option<Slice>,
    cache: Cache,
    cached_len: Option<usize>,
}

impl<S: Store> std::fmt::Debug for Collection<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("constraints", &self.constraints)
            .field("sort", &self.sort)
            .field("output", &self.output)
            .field("pending_slice", &self.pending_slice)
            .field("cached_len", &self.cached_len)
            .finish()
    }
}

impl<'a, S: Store> Collection<'a, S> {
    fn new(schema: &'a ModelSchema, store: &'a S) -> Self {
        Self {
            schema,
            store,
            config: schema.config(),
            constraints: Vec::new(),
            sort: None,
            output: OutputMode::Pks,
            pending_slice: None,
            cache: Cache::Empty,
            cached_len: None,
        }
    }

    // ------------------------------------------------------------------
    // Builders (no store access)
    // ------------------------------------------------------------------

    /// Adds an equality constraint.
    ///
    /// Validation happens now, against the declarations only; a path naming
    /// an unknown or non-indexable field fails before any store command.
    pub fn filter(mut self, path: &str, value: impl Into<Value>) -> QueryResult<Self> {
        let value = value.into();
        let constraint = FilterPlanner::new(self.schema).constraint(path, &value)?;
        self.constraints.push(constraint);
        self.invalidate();
        Ok(self)
    }

    /// Requests a sort. Nothing is validated here; a bad sort surfaces at
    /// resolution time with the store's own error.
    pub fn sort(mut self, options: SortOptions) -> Self {
        self.sort = Some(options);
        self.invalidate();
        self
    }

    /// Switches the output to existence-checked instances
    pub fn instances(mut self) -> Self {
        self.output = OutputMode::Instances { lazy: false };
        self.invalidate();
        self
    }

    /// Switches the output to instances without existence checks
    pub fn lazy_instances(mut self) -> Self {
        self.output = OutputMode::Instances { lazy: true };
        self.invalidate();
        self
    }

    /// Switches the output back to primary keys, cancelling instances
    pub fn primary_keys(mut self) -> Self {
        self.output = OutputMode::Pks;
        self.invalidate();
        self
    }

    /// Sets a pending slice. A view operation: the underlying resolution
    /// cache survives, and the bounds apply to the next consumption only.
    pub fn slice(mut self, start: i64, stop: Option<i64>) -> Self {
        self.pending_slice = Some(Slice { start, stop });
        self
    }

    // ------------------------------------------------------------------
    // Observations (store access happens here)
    // ------------------------------------------------------------------

    /// Resolves and returns the collection's members.
    ///
    /// Consumes the pending slice if one is set; the next call without a new
    /// slice yields the full unsliced sequence again.
    pub fn members(&mut self) -> QueryResult<CollectionResults<'a, S>> {
        let pks = match self.pending_slice.take() {
            Some(slice) => self.resolve_window(slice)?,
            None => self.resolve_full()?,
        };
        self.output
            .finalize(self.schema, self.store, pks, self.config.max_repr_items)
    }

    /// Resolves one window without touching the pending slice state
    pub fn range(&mut self, start: i64, stop: Option<i64>) -> QueryResult<CollectionResults<'a, S>> {
        let pks = self.resolve_window(Slice { start, stop })?;
        self.output
            .finalize(self.schema, self.store, pks, self.config.max_repr_items)
    }

    /// Random access by position, negatives counting from the end.
    ///
    /// Returns None past either end, and in checked-instance mode also when
    /// the record at that position no longer exists.
    pub fn get(&mut self, index: i64) -> QueryResult<Option<ResultItem<'a, S>>> {
        let pk = if index >= 0 {
            if let Cache::Full(pks) = &self.cache {
                pks.get(index as usize).cloned()
            } else {
                let window = Slice {
                    start: index,
                    stop: Some(index + 1),
                };
                self.resolve_window(window)?.into_iter().next()
            }
        } else {
            let full = self.resolve_full()?;
            let position = full.len() as i64 + index;
            if position < 0 {
                None
            } else {
                full.get(position as usize).cloned()
            }
        };

        match pk {
            None => Ok(None),
            Some(pk) => {
                let results = self.output.finalize(
                    self.schema,
                    self.store,
                    vec![pk],
                    self.config.max_repr_items,
                )?;
                Ok(results.into_iter().next())
            }
        }
    }

    /// Cardinality without materialization.
    ///
    /// Prefers, in order: an already resolved full sequence, the cached
    /// estimate, then one cardinality primitive on the plan's key. A pending
    /// slice is answered with bound arithmetic over the unsliced length.
    /// Never sorts.
    pub fn len(&mut self) -> QueryResult<usize> {
        let base = if let Cache::Full(pks) = &self.cache {
            pks.len()
        } else if let Some(cached) = self.cached_len {
            cached
        } else {
            let plan = self.plan();
            let estimated = self.estimate_len(&plan)?;
            self.cached_len = Some(estimated);
            estimated
        };
        Ok(match &self.pending_slice {
            Some(slice) => slice.window_len(base),
            None => base,
        })
    }

    /// True when nothing matches
    pub fn is_empty(&mut self) -> QueryResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Describes the plan the current constraints compile to
    pub fn explain(&self) -> PlanExplain {
        self.plan().explain(&self.schema.collection_key())
    }

    // ------------------------------------------------------------------
    // Resolution internals
    // ------------------------------------------------------------------

    fn plan(&self) -> FilterPlan {
        FilterPlanner::new(self.schema).plan(&self.constraints)
    }

    fn invalidate(&mut self) {
        self.cache = Cache::Empty;
        self.cached_len = None;
    }

    fn resolve_full(&mut self) -> QueryResult<Vec<String>> {
        if let Cache::Full(pks) = &self.cache {
            return Ok(pks.clone());
        }

        let plan = self.plan();
        let pks = match &self.sort {
            Some(options) => sorter::execute(self.schema, self.store, &plan, options, None)?,
            None => self.read_plan(&plan)?,
        };

        let count = pks.len().to_string();
        Logger::log(
            Severity::Trace,
            "collection.resolve",
            &[
                ("namespace", self.schema.namespace()),
                ("strategy", plan.strategy()),
                ("count", count.as_str()),
            ],
        );

        self.cached_len = Some(pks.len());
        self.cache = Cache::Full(pks.clone());
        Ok(pks)
    }

    fn resolve_window(&mut self, slice: Slice) -> QueryResult<Vec<String>> {
        if let Cache::Full(pks) = &self.cache {
            return Ok(slice.apply(pks));
        }
        if let Cache::Window(cached_slice, pks) = &self.cache {
            if *cached_slice == slice {
                return Ok(pks.clone());
            }
        }

        // A sorted window with known non-negative bounds pushes the slice
        // into the SORT itself; everything else realizes the full sequence.
        if self.sort.is_some() && slice.non_negative() {
            let plan = self.plan();
            let options = self.sort.clone().unwrap_or_default();
            let pks =
                sorter::execute(self.schema, self.store, &plan, &options, Some(slice.to_limit()))?;
            self.cache = Cache::Window(slice, pks.clone());
            return Ok(pks);
        }

        let full = self.resolve_full()?;
        Ok(slice.apply(&full))
    }

    /// Reads a plan without sorting
    fn read_plan(&self, plan: &FilterPlan) -> QueryResult<Vec<String>> {
        Ok(match plan {
            FilterPlan::All => self.store.smembers(&self.schema.collection_key())?,
            FilterPlan::Nothing => Vec::new(),
            FilterPlan::DirectPk { pk } => {
                if self.store.sismember(&self.schema.collection_key(), pk)? {
                    vec![pk.clone()]
                } else {
                    Vec::new()
                }
            }
            FilterPlan::SingleIndex { key } => self.store.smembers(key)?,
            FilterPlan::Intersection { keys } => self.store.sinter(keys)?,
            FilterPlan::PkWithIndexes { pk, keys } => {
                let mut member_of_all = true;
                for key in keys {
                    if !self.store.sismember(key, pk)? {
                        member_of_all = false;
                        break;
                    }
                }
                if member_of_all {
                    vec![pk.clone()]
                } else {
                    Vec::new()
                }
            }
        })
    }

    /// Cardinality primitives per plan shape; the multi-key case goes
    /// through a temporary key whose store count is taken at creation.
    fn estimate_len(&self, plan: &FilterPlan) -> QueryResult<usize> {
        Ok(match plan {
            FilterPlan::Nothing => 0,
            FilterPlan::All => self.store.scard(&self.schema.collection_key())?,
            FilterPlan::DirectPk { pk } => {
                usize::from(self.store.sismember(&self.schema.collection_key(), pk)?)
            }
            FilterPlan::SingleIndex { key } => self.store.scard(key)?,
            FilterPlan::PkWithIndexes { pk, keys } => {
                for key in keys {
                    if !self.store.sismember(key, pk)? {
                        return Ok(0);
                    }
                }
                1
            }
            FilterPlan::Intersection { keys } => {
                let (temp, count) = TempKey::create(self.store, self.schema, keys)?;
                temp.release()?;
                count
            }
        })
    }
}
