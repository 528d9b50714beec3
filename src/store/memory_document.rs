//! In-memory document store
//!
//! Reference [`DocumentStore`] enforcing the native engine's rules that the
//! executor has to work around: membership lists of at most 30 values, no
//! empty membership lists, batches of at most 500 writes, and all-or-nothing
//! commits.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;

use super::document::{DocumentStore, NativeQuery, WriteBatch, WriteOp};
use super::StoreFuture;
use crate::config::{MAX_BATCH_WRITES, MAX_IN_VALUES};
use crate::errors::{StoreError, StoreResult};
use crate::query::{PredicateFilter, Record, ResultSorter, ID_FIELD};

const UNLIMITED: usize = usize::MAX;

/// Length of generated document ids
const AUTO_ID_LEN: usize = 20;

/// Collection -> document id -> fields (without `id`)
type Collections = HashMap<String, BTreeMap<String, Record>>;

/// In-memory document store
pub struct MemoryDocumentStore {
    collections: RwLock<Collections>,
    queries: AtomicUsize,
    commits: AtomicUsize,
    /// Commits still allowed before injected failures start
    commit_budget: AtomicUsize,
    /// Queries whose membership list contains one of these values fail
    poisoned_values: Mutex<Vec<Value>>,
    offline: AtomicBool,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            queries: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            commit_budget: AtomicUsize::new(UNLIMITED),
            poisoned_values: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Seed a document directly, bypassing batches and counters
    pub fn put(&self, collection: &str, id: &str, mut data: Record) -> StoreResult<()> {
        data.remove(ID_FIELD);
        self.collections
            .write()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
        Ok(())
    }

    /// Stored fields of one document
    pub fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        Ok(self
            .collections
            .read()?
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> StoreResult<usize> {
        Ok(self.collections.read()?.get(collection).map_or(0, BTreeMap::len))
    }

    /// Number of native queries served so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of successful batch commits
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Fail every query whose membership filter contains `value`
    pub fn fail_queries_matching(&self, value: Value) -> StoreResult<()> {
        self.poisoned_values.lock()?.push(value);
        Ok(())
    }

    /// Let `n` more commits succeed, then reject every following batch whole
    pub fn fail_commits_after(&self, n: usize) {
        self.commit_budget.store(n, Ordering::SeqCst);
    }

    /// Simulate a lost connection: every call fails
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::backend_with_code("client is offline", "unavailable"));
        }
        Ok(())
    }

    fn validate_query(&self, query: &NativeQuery) -> StoreResult<()> {
        let poisoned = self.poisoned_values.lock()?;
        for members in query.filters.iter().filter_map(|f| f.members()) {
            if members.is_empty() {
                return Err(StoreError::backend_with_code(
                    "'in' filters require a non-empty array",
                    "invalid-argument",
                ));
            }
            if members.len() > MAX_IN_VALUES {
                return Err(StoreError::backend_with_code(
                    format!(
                        "'in' filters support at most {} elements, got {}",
                        MAX_IN_VALUES,
                        members.len()
                    ),
                    "invalid-argument",
                ));
            }
            if members.iter().any(|m| poisoned.contains(m)) {
                return Err(StoreError::backend_with_code("query failed", "unavailable"));
            }
        }
        Ok(())
    }

    fn run_query_sync(&self, query: NativeQuery) -> StoreResult<Vec<Record>> {
        self.check_online()?;
        self.validate_query(&query)?;
        self.queries.fetch_add(1, Ordering::SeqCst);

        let collections = self.collections.read()?;
        let mut records: Vec<Record> = collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| {
                        let mut record = fields.clone();
                        record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                        record
                    })
                    .filter(|record| PredicateFilter::matches(record, &query.filters))
                    .collect()
            })
            .unwrap_or_default();
        drop(collections);

        ResultSorter::sort_with_id_tiebreak(&mut records, &query.order_by);
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }

        Ok(records)
    }

    fn commit_sync(&self, batch: WriteBatch) -> StoreResult<()> {
        self.check_online()?;
        if batch.len() > MAX_BATCH_WRITES {
            return Err(StoreError::backend_with_code(
                format!("batch of {} writes exceeds {}", batch.len(), MAX_BATCH_WRITES),
                "invalid-argument",
            ));
        }

        let spent = self
            .commit_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| match budget {
                0 => None,
                UNLIMITED => Some(UNLIMITED),
                n => Some(n - 1),
            });
        if spent.is_err() {
            return Err(StoreError::backend_with_code("commit aborted", "aborted"));
        }

        let mut collections = self.collections.write()?;

        // Validate the whole batch before touching anything
        for op in &batch.ops {
            if let WriteOp::Merge { collection, id, .. } = op {
                let exists = collections
                    .get(collection)
                    .is_some_and(|docs| docs.contains_key(id));
                if !exists {
                    return Err(StoreError::backend_with_code(
                        format!("no document to update: {}/{}", collection, id),
                        "not-found",
                    ));
                }
            }
        }

        for op in batch.ops {
            match op {
                WriteOp::Set {
                    collection,
                    id,
                    mut data,
                } => {
                    data.remove(ID_FIELD);
                    collections.entry(collection).or_default().insert(id, data);
                }
                WriteOp::Merge {
                    collection,
                    id,
                    patch,
                } => {
                    if let Some(doc) = collections.get_mut(&collection).and_then(|d| d.get_mut(&id))
                    {
                        for (key, value) in patch {
                            if key != ID_FIELD {
                                doc.insert(key, value);
                            }
                        }
                    }
                }
                WriteOp::Delete { collection, id } => {
                    if let Some(docs) = collections.get_mut(&collection) {
                        docs.remove(&id);
                    }
                }
            }
        }

        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn run_query(&self, query: NativeQuery) -> StoreFuture<'_, Vec<Record>> {
        Box::pin(async move { self.run_query_sync(query) })
    }

    fn allocate_id(&self, _collection: &str) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(AUTO_ID_LEN)
            .map(char::from)
            .collect()
    }

    fn commit(&self, batch: WriteBatch) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.commit_sync(batch) })
    }
}
