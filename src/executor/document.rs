//! Document store executor
//!
//! Filters and orderings are pushed down natively. A membership filter
//! larger than the engine accepts is split into chunks that run in
//! parallel; their pages are concatenated, re-sorted with the native
//! comparator and re-limited so the result equals one unchunked query.
//! Mutations commit one atomic batch per read chunk.

use std::sync::Arc;

use futures_util::future::try_join_all;
use serde_json::Value;
use tracing::Instrument;

use super::stamp::{now_timestamp, stamp_insert, stamp_update, supplied_id};
use super::{finish, merged, query_span, shape_inserted, shape_read, shape_rows};
use super::{ExecuteFuture, Executor};
use crate::config::StoreConfig;
use crate::envelope::Data;
use crate::errors::{StoreError, StoreResult};
use crate::query::{
    values_equal, FilterCondition, InsertPayload, Mutation, PredicateFilter, QuerySpec, Record,
    ResultSorter, ID_FIELD,
};
use crate::store::{DocumentStore, NativeQuery, WriteBatch};

const ENGINE: &str = "document";

/// A matched record and the read chunk it came from
#[derive(Debug, Clone)]
struct Tagged {
    chunk: usize,
    record: Record,
}

/// How a spec's filters map onto native queries
#[derive(Debug, Default)]
struct QueryPlan {
    /// Filters sent with every native query
    native: Vec<FilterCondition>,
    /// Membership filter split across queries: field and value chunks
    chunked: Option<(String, Vec<Vec<Value>>)>,
    /// Further oversized membership filters, evaluated after the fetch
    residual: Vec<FilterCondition>,
}

impl QueryPlan {
    fn build(spec: &QuerySpec, chunk_size: usize) -> Self {
        let mut plan = QueryPlan::default();

        for filter in &spec.filters {
            match filter.members() {
                Some(members) if members.len() > chunk_size => {
                    if plan.chunked.is_none() {
                        let unique = dedup(members);
                        let chunks = unique.chunks(chunk_size).map(<[Value]>::to_vec).collect();
                        plan.chunked = Some((filter.field.clone(), chunks));
                    } else {
                        plan.residual.push(filter.clone());
                    }
                }
                _ => plan.native.push(filter.clone()),
            }
        }

        plan
    }

    /// Native limit is only exact when no filter runs after the fetch
    fn native_limit(&self, spec: &QuerySpec) -> Option<usize> {
        if self.residual.is_empty() {
            spec.limit
        } else {
            None
        }
    }
}

/// Executor over a collection/query document store
pub struct DocumentExecutor {
    store: Arc<dyn DocumentStore>,
    config: StoreConfig,
}

impl DocumentExecutor {
    pub fn new(store: Arc<dyn DocumentStore>, config: StoreConfig) -> Self {
        Self { store, config }
    }

    async fn run(&self, spec: QuerySpec) -> StoreResult<Option<Data>> {
        match spec.mutation.clone() {
            None => {
                let records = self.read(&spec).await?;
                shape_read(&spec, records.into_iter().map(|t| t.record).collect())
            }
            Some(Mutation::Insert(payload)) => self.insert(&spec, payload).await,
            Some(Mutation::Update(patch)) => self.update(&spec, patch).await,
            Some(Mutation::Delete) => self.delete(&spec).await,
        }
    }

    /// Read-and-filter, chunking oversized membership filters
    async fn read(&self, spec: &QuerySpec) -> StoreResult<Vec<Tagged>> {
        if spec.is_unsatisfiable() {
            tracing::debug!("empty membership filter, skipping backend query");
            return Ok(Vec::new());
        }

        let plan = QueryPlan::build(spec, self.config.in_chunk_size.max(1));
        let limit = plan.native_limit(spec);

        let mut tagged = match &plan.chunked {
            None => {
                let query = NativeQuery {
                    collection: spec.collection.clone(),
                    filters: plan.native.clone(),
                    order_by: spec.orderings.clone(),
                    limit,
                };
                self.store
                    .run_query(query)
                    .await?
                    .into_iter()
                    .map(|record| Tagged { chunk: 0, record })
                    .collect::<Vec<_>>()
            }
            Some((field, chunks)) => {
                tracing::info!(%field, chunks = chunks.len(), "chunking membership filter");

                let queries = chunks.iter().map(|chunk| {
                    let mut filters = plan.native.clone();
                    filters.push(FilterCondition::in_list(field.clone(), chunk.clone()));
                    self.store.run_query(NativeQuery {
                        collection: spec.collection.clone(),
                        filters,
                        order_by: spec.orderings.clone(),
                        limit,
                    })
                });

                // Any failed chunk fails the whole read; sibling pages are dropped
                let pages = try_join_all(queries).await?;

                let mut combined: Vec<Tagged> = Vec::new();
                for (chunk, page) in pages.into_iter().enumerate() {
                    for record in page {
                        // A document matched by two chunks is kept once, in its first chunk
                        if !combined.iter().any(|t| same_id(&t.record, &record)) {
                            combined.push(Tagged { chunk, record });
                        }
                    }
                }
                combined.sort_by(|a, b| {
                    ResultSorter::compare_with_id_tiebreak(&a.record, &b.record, &spec.orderings)
                });
                combined
            }
        };

        if !plan.residual.is_empty() {
            tagged.retain(|t| PredicateFilter::matches(&t.record, &plan.residual));
        }
        if let Some(limit) = spec.limit {
            tagged.truncate(limit);
        }

        tracing::debug!(matched = tagged.len(), "document read complete");
        Ok(tagged)
    }

    async fn insert(&self, spec: &QuerySpec, payload: InsertPayload) -> StoreResult<Option<Data>> {
        let single_payload = payload.is_single();
        let now = now_timestamp();

        let written: Vec<Record> = payload
            .into_records()
            .into_iter()
            .map(|mut record| {
                let id = supplied_id(&record)
                    .unwrap_or_else(|| self.store.allocate_id(&spec.collection));
                record.insert(ID_FIELD.to_string(), Value::String(id));
                stamp_insert(&mut record, &now);
                record
            })
            .collect();

        for rows in written.chunks(self.config.max_batch_writes.max(1)) {
            let mut batch = WriteBatch::new();
            for record in rows {
                batch.set(&spec.collection, record_id(record), record.clone());
            }
            self.store.commit(batch).await?;
        }

        shape_inserted(spec, single_payload, written)
    }

    async fn update(&self, spec: &QuerySpec, mut patch: Record) -> StoreResult<Option<Data>> {
        let targets = self.read(&spec.read_part()).await?;
        if targets.is_empty() {
            return Err(StoreError::not_found(spec.collection.as_str()));
        }

        stamp_update(&mut patch, &now_timestamp());

        self.commit_per_chunk(&targets, |batch, record| {
            batch.merge(&spec.collection, record_id(record), patch.clone());
        })
        .await?;

        let updated = targets
            .iter()
            .map(|t| merged(&t.record, &patch, false))
            .collect();
        shape_rows(spec, updated)
    }

    async fn delete(&self, spec: &QuerySpec) -> StoreResult<Option<Data>> {
        let targets = self.read(&spec.read_part()).await?;
        if targets.is_empty() {
            return Err(StoreError::not_found(spec.collection.as_str()));
        }

        self.commit_per_chunk(&targets, |batch, record| {
            batch.delete(&spec.collection, record_id(record));
        })
        .await?;

        Ok(None)
    }

    /// One atomic commit per read chunk, split further at the batch cap.
    ///
    /// Commits run in chunk order; a failure leaves earlier chunks applied.
    async fn commit_per_chunk<F>(&self, targets: &[Tagged], mut add: F) -> StoreResult<()>
    where
        F: FnMut(&mut WriteBatch, &Record),
    {
        let mut groups: Vec<(usize, Vec<&Record>)> = Vec::new();
        for target in targets {
            match groups.iter_mut().find(|(chunk, _)| *chunk == target.chunk) {
                Some((_, members)) => members.push(&target.record),
                None => groups.push((target.chunk, vec![&target.record])),
            }
        }
        groups.sort_by_key(|(chunk, _)| *chunk);

        let mut batches = Vec::new();
        for (_, members) in &groups {
            for part in members.chunks(self.config.max_batch_writes.max(1)) {
                let mut batch = WriteBatch::new();
                for record in part {
                    add(&mut batch, *record);
                }
                batches.push(batch);
            }
        }

        let total = batches.len();
        for (committed, batch) in batches.into_iter().enumerate() {
            if let Err(err) = self.store.commit(batch).await {
                if committed > 0 {
                    tracing::warn!(committed, total, "batched mutation stopped part-way");
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

impl Executor for DocumentExecutor {
    fn execute(&self, spec: QuerySpec) -> ExecuteFuture<'_> {
        let span = query_span(ENGINE, &spec);
        Box::pin(async move { finish(ENGINE, self.run(spec).await) }.instrument(span))
    }

    fn engine(&self) -> &'static str {
        ENGINE
    }
}

fn record_id(record: &Record) -> &str {
    record.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default()
}

fn same_id(a: &Record, b: &Record) -> bool {
    matches!((a.get(ID_FIELD), b.get(ID_FIELD)), (Some(x), Some(y)) if x == y)
}

/// Drops repeated members, keeping first occurrences in order.
///
/// Numbers compare as the predicate does, so `1` and `1.0` are one member.
fn dedup(members: &[Value]) -> Vec<Value> {
    let mut unique: Vec<Value> = Vec::with_capacity(members.len());
    for member in members {
        if !unique.iter().any(|u| values_equal(u, member)) {
            unique.push(member.clone());
        }
    }
    unique
}
