//! duostore - one chainable query interface over two storage engines
//!
//! A [`Database`] hands out [`QueryHandle`]s for named collections. Callers
//! chain filters, ordering, limits, selection and at most one mutation,
//! then await the handle to get a [`ResultEnvelope`]. The same handle code
//! runs unchanged against either engine:
//!
//! - a hierarchical tree store (one native ordered dimension, client-side
//!   filtering, sequential writes), or
//! - a document store (native filtering and ordering, chunked membership
//!   filters, atomic batch writes).

pub mod config;
pub mod envelope;
pub mod errors;
pub mod executor;
pub mod handle;
pub mod query;
pub mod store;

pub use config::StoreConfig;
pub use envelope::{Data, ErrorInfo, ErrorKind, ResultEnvelope};
pub use errors::{StoreError, StoreResult};
pub use executor::{DocumentExecutor, Executor, TreeExecutor};
pub use handle::{Database, QueryHandle};
pub use query::{FilterCondition, FilterOperator, OrderCondition, QuerySpec, Record};
