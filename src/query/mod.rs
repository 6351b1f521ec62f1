//! Query engine for keeldb
//!
//! The flow, stage by stage:
//!
//! 1. Filter paths are parsed and validated against the schema (`path`,
//!    configuration errors surface here, before any store access).
//! 2. Constraints compile into a [`FilterPlan`] over store keys (`planner`).
//! 3. A [`Collection`] holds the plan inputs lazily and resolves them on
//!    observation, caching until a mutating call (`collection`).
//! 4. Sorts run directly against existing keys or through a temporary
//!    computed set with guaranteed cleanup (`sorter`).
//! 5. The output mode finalizes pks into results or instances
//!    (`materialize`, `results`).

mod collection;
mod errors;
mod materialize;
mod path;
mod planner;
mod results;
mod sorter;

pub use collection::{Collection, DefaultManager, Manager, Slice};
pub use errors::{QueryError, QueryResult};
pub use materialize::OutputMode;
pub use path::FieldPath;
pub use planner::{Constraint, ConstraintTarget, FilterPlan, FilterPlanner, PlanExplain};
pub use results::{CollectionResults, ResultItem};
pub use sorter::SortOptions;
