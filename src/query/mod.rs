//! Query description layer
//!
//! Engine-agnostic pieces shared by both executors:
//!
//! 1. Conditions: `{field, operator, value}` and `{field, direction}`
//! 2. Spec: the chainable accumulator for one logical query
//! 3. Filters: client-side AND evaluation of conditions
//! 4. Sorter: the single comparator used for every ordering decision
//! 5. Select: advisory projection, applied last

mod condition;
mod filters;
mod select;
mod sorter;
mod spec;

pub use condition::{FilterCondition, FilterOperator, OrderCondition, SortDirection};
pub use filters::PredicateFilter;
pub(crate) use filters::values_equal;
pub use select::{parse_selectors, project};
pub use sorter::ResultSorter;
pub use spec::{InsertPayload, Mutation, QuerySpec, Record, SpecKind, ID_FIELD};
