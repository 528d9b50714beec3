//! Query Executor subsystem
//!
//! An executor consumes one [`QuerySpec`] and produces one
//! [`ResultEnvelope`]. Two implementations share this contract:
//!
//! - [`TreeExecutor`]: one native ordered dimension, client-side filtering,
//!   sequential (non-atomic) per-record mutations.
//! - [`DocumentExecutor`]: native filter/order pushdown, chunked membership
//!   filters merged client-side, atomic batched mutations per chunk.
//!
//! # Execution Flow
//!
//! 1. Short-circuit unsatisfiable specs (empty `in`) without I/O
//! 2. Read candidates natively
//! 3. Filter, sort, limit client-side where the engine could not
//! 4. Apply mutation to the discovered target set, if any
//! 5. Shape the outcome: one record, a list, or nothing
//!
//! Ordering beyond the first key is best-effort: the tree store honours
//! only the primary ordering unless secondary emulation is configured.

mod document;
mod ids;
mod stamp;
mod tree;

use std::future::Future;
use std::pin::Pin;

use crate::envelope::{Data, ResultEnvelope};
use crate::errors::{StoreError, StoreResult};
use crate::query::{project, QuerySpec, Record};

pub use document::DocumentExecutor;
pub use ids::PushIdGenerator;
pub use stamp::{now_timestamp, CREATED_AT, UPDATED_AT};
pub use tree::TreeExecutor;

/// Boxed future returned by [`Executor::execute`]
pub type ExecuteFuture<'a> = Pin<Box<dyn Future<Output = ResultEnvelope> + Send + 'a>>;

/// Resolves a spec against one backing engine
pub trait Executor: Send + Sync {
    /// Execute the spec. Expected conditions (empty reads, empty match
    /// sets, backend failures) are reported in the envelope, never panicked.
    fn execute(&self, spec: QuerySpec) -> ExecuteFuture<'_>;

    /// Short engine name used in logs
    fn engine(&self) -> &'static str;
}

/// Shapes a finished read: projection, then `single` handling
pub(crate) fn shape_read(spec: &QuerySpec, records: Vec<Record>) -> StoreResult<Option<Data>> {
    let records = project(records, spec.select_fields.as_deref());
    shape_rows(spec, records)
}

/// `single` takes the first row or fails with NotFound; otherwise a list
pub(crate) fn shape_rows(spec: &QuerySpec, records: Vec<Record>) -> StoreResult<Option<Data>> {
    if spec.single {
        return records
            .into_iter()
            .next()
            .map(|record| Some(Data::One(record)))
            .ok_or_else(|| StoreError::not_found(spec.collection.as_str()));
    }
    Ok(Some(Data::Many(records)))
}

/// Shapes inserted rows like the payload: one in, one out
pub(crate) fn shape_inserted(
    spec: &QuerySpec,
    single_payload: bool,
    records: Vec<Record>,
) -> StoreResult<Option<Data>> {
    let mut records = project(records, spec.select_fields.as_deref());
    if single_payload && records.len() == 1 {
        if let Some(record) = records.pop() {
            return Ok(Some(Data::One(record)));
        }
    }
    shape_rows(spec, records)
}

/// Logs and wraps an executor outcome
pub(crate) fn finish(engine: &'static str, result: StoreResult<Option<Data>>) -> ResultEnvelope {
    match &result {
        Ok(_) => tracing::debug!(engine, "query succeeded"),
        Err(StoreError::NotFound(collection)) => {
            tracing::debug!(engine, %collection, "no matching records")
        }
        Err(err) => tracing::error!(engine, error = %err, "query failed"),
    }
    ResultEnvelope::from_result(result)
}

/// Applies a merge patch to a copy of a record; null removes the field
pub(crate) fn merged(record: &Record, patch: &Record, null_removes: bool) -> Record {
    let mut out = record.clone();
    for (key, value) in patch {
        if null_removes && value.is_null() {
            out.remove(key);
        } else {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

/// Tracing span for one execution
pub(crate) fn query_span(engine: &'static str, spec: &QuerySpec) -> tracing::Span {
    tracing::debug_span!(
        "query",
        engine,
        collection = %spec.collection,
        kind = spec.kind().as_str(),
        query_id = %uuid::Uuid::new_v4(),
    )
}
