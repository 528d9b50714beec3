//! Tree store executor
//!
//! Reads fetch the collection subtree through at most one native
//! ordering/pagination window, then filter, sort and limit client-side.
//! Mutations are applied record by record, in order, without atomicity: a
//! failure part-way leaves earlier writes applied and later ones untried.

use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use super::ids::PushIdGenerator;
use super::stamp::{now_timestamp, stamp_insert, stamp_update, supplied_id};
use super::{finish, merged, query_span, shape_inserted, shape_read, shape_rows};
use super::{ExecuteFuture, Executor};
use crate::config::StoreConfig;
use crate::envelope::Data;
use crate::errors::{StoreError, StoreResult};
use crate::query::{
    InsertPayload, Mutation, PredicateFilter, QuerySpec, Record, ResultSorter, ID_FIELD,
};
use crate::store::{TreeLimit, TreeOrder, TreeStore, TreeWindow};

const ENGINE: &str = "tree";

/// Executor over a hierarchical key-value store
pub struct TreeExecutor {
    store: Arc<dyn TreeStore>,
    config: StoreConfig,
    ids: PushIdGenerator,
}

impl TreeExecutor {
    pub fn new(store: Arc<dyn TreeStore>, config: StoreConfig) -> Self {
        Self {
            store,
            config,
            ids: PushIdGenerator::new(),
        }
    }

    async fn run(&self, spec: QuerySpec) -> StoreResult<Option<Data>> {
        match spec.mutation.clone() {
            None => {
                let records = self.read(&spec).await?;
                shape_read(&spec, records)
            }
            Some(Mutation::Insert(payload)) => self.insert(&spec, payload).await,
            Some(Mutation::Update(patch)) => self.update(&spec, patch).await,
            Some(Mutation::Delete) => self.delete(&spec).await,
        }
    }

    /// The single native window this spec can use.
    ///
    /// The limit is pushed down only when nothing is filtered or re-sorted
    /// client-side afterwards; otherwise the page would be cut before the
    /// predicates ran.
    fn window(&self, spec: &QuerySpec) -> TreeWindow {
        let primary = spec.orderings.first();
        let resorted = self.config.emulate_secondary_order && spec.orderings.len() > 1;
        let limit = spec
            .limit
            .filter(|_| spec.filters.is_empty() && !resorted);

        match primary {
            Some(order) => {
                let native = if order.field == ID_FIELD {
                    TreeOrder::Key
                } else {
                    TreeOrder::Child(order.field.clone())
                };
                TreeWindow {
                    order_by: Some(native),
                    limit: limit.map(|n| {
                        if order.is_ascending() {
                            TreeLimit::First(n)
                        } else {
                            TreeLimit::Last(n)
                        }
                    }),
                }
            }
            None => TreeWindow {
                order_by: None,
                limit: limit.map(TreeLimit::First),
            },
        }
    }

    /// Read-and-filter: the records a spec matches, in result order
    async fn read(&self, spec: &QuerySpec) -> StoreResult<Vec<Record>> {
        if spec.is_unsatisfiable() {
            tracing::debug!("empty membership filter, skipping backend read");
            return Ok(Vec::new());
        }

        let window = self.window(spec);
        tracing::debug!(?window, "native tree window");

        let path = self.config.collection_path(&spec.collection);
        let children = self.store.read(&path, window).await?;
        let mut records = decode(children);

        // Native order is ascending; a descending primary key reads reversed
        if spec.orderings.first().is_some_and(|o| !o.is_ascending()) {
            records.reverse();
        }

        PredicateFilter::retain(&mut records, &spec.filters);

        if spec.orderings.len() > 1 {
            if self.config.emulate_secondary_order {
                // Same tie-break as the document store: id, in the last key's direction
                ResultSorter::sort_with_id_tiebreak(&mut records, &spec.orderings);
            } else {
                tracing::warn!(
                    dropped = spec.orderings.len() - 1,
                    "tree store honours only the first ordering"
                );
            }
        }

        if let Some(limit) = spec.limit {
            records.truncate(limit);
        }

        tracing::debug!(matched = records.len(), "tree read complete");
        Ok(records)
    }

    async fn insert(&self, spec: &QuerySpec, payload: InsertPayload) -> StoreResult<Option<Data>> {
        let single_payload = payload.is_single();
        let rows = payload.into_records();
        let now = now_timestamp();
        let total = rows.len();

        let mut written = Vec::with_capacity(total);
        for mut record in rows {
            let key = match supplied_id(&record) {
                Some(id) => id,
                None => self.ids.next_id()?,
            };
            record.insert(ID_FIELD.to_string(), Value::String(key.clone()));
            stamp_insert(&mut record, &now);

            let path = self.config.record_path(&spec.collection, &key);
            self.store
                .set(&path, Value::Object(record.clone()))
                .await
                .map_err(|err| partial_failure("insert", written.len(), total, err))?;
            written.push(record);
        }

        shape_inserted(spec, single_payload, written)
    }

    async fn update(&self, spec: &QuerySpec, mut patch: Record) -> StoreResult<Option<Data>> {
        let targets = self.read(&spec.read_part()).await?;
        if targets.is_empty() {
            return Err(StoreError::not_found(spec.collection.as_str()));
        }

        stamp_update(&mut patch, &now_timestamp());

        let mut updated = Vec::with_capacity(targets.len());
        for target in &targets {
            let path = self.record_path(spec, target);
            self.store
                .update(&path, patch.clone())
                .await
                .map_err(|err| partial_failure("update", updated.len(), targets.len(), err))?;
            updated.push(merged(target, &patch, true));
        }

        shape_rows(spec, updated)
    }

    async fn delete(&self, spec: &QuerySpec) -> StoreResult<Option<Data>> {
        let targets = self.read(&spec.read_part()).await?;
        if targets.is_empty() {
            return Err(StoreError::not_found(spec.collection.as_str()));
        }

        for (applied, target) in targets.iter().enumerate() {
            let path = self.record_path(spec, target);
            self.store
                .remove(&path)
                .await
                .map_err(|err| partial_failure("delete", applied, targets.len(), err))?;
        }

        Ok(None)
    }

    fn record_path(&self, spec: &QuerySpec, record: &Record) -> String {
        let key = record.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default();
        self.config.record_path(&spec.collection, key)
    }
}

impl Executor for TreeExecutor {
    fn execute(&self, spec: QuerySpec) -> ExecuteFuture<'_> {
        let span = query_span(ENGINE, &spec);
        Box::pin(async move { finish(ENGINE, self.run(spec).await) }.instrument(span))
    }

    fn engine(&self) -> &'static str {
        ENGINE
    }
}

/// Children to records; the child key always wins as `id`
fn decode(children: Vec<(String, Value)>) -> Vec<Record> {
    children
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Object(mut record) => {
                record.insert(ID_FIELD.to_string(), Value::String(key));
                Some(record)
            }
            _ => {
                tracing::debug!(%key, "skipping non-record child");
                None
            }
        })
        .collect()
}

/// Logs how far a sequential mutation got before `err`
fn partial_failure(op: &str, applied: usize, total: usize, err: StoreError) -> StoreError {
    if applied > 0 {
        tracing::warn!(op, applied, total, "sequential mutation stopped part-way");
    }
    err
}
