//! # Query Handles
//!
//! [`Database::handle`] returns a [`QueryHandle`] bound to one executor.
//! Chain methods only change the pending spec; nothing touches a store
//! until the handle is consumed with `.await` or [`QueryHandle::execute`].
//! Consuming takes the handle by value, so a built query runs exactly once.
//!
//! ```ignore
//! let db = Database::tree(Arc::new(MemoryTree::new()), StoreConfig::default())?;
//! let result = db
//!     .handle("vehicles")
//!     .eq("operator_id", "OP1")
//!     .order("name", true)
//!     .limit(2)
//!     .await;
//! if let Some(err) = &result.error { /* ... */ }
//! ```

use std::any::Any;
use std::fmt;
use std::future::IntoFuture;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;

use crate::config::StoreConfig;
use crate::envelope::ResultEnvelope;
use crate::errors::{StoreError, StoreResult};
use crate::executor::{DocumentExecutor, ExecuteFuture, Executor, TreeExecutor};
use crate::query::{InsertPayload, QuerySpec, Record};
use crate::store::{DocumentStore, TreeStore};

/// Entry point: hands out query handles over one engine
#[derive(Clone)]
pub struct Database {
    executor: Arc<dyn Executor>,
}

impl Database {
    /// Wrap any executor
    pub fn new(executor: impl Executor + 'static) -> Self {
        Self {
            executor: Arc::new(executor),
        }
    }

    /// Database over a tree store
    pub fn tree(store: Arc<dyn TreeStore>, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self::new(TreeExecutor::new(store, config)))
    }

    /// Database over a document store
    pub fn document(store: Arc<dyn DocumentStore>, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self::new(DocumentExecutor::new(store, config)))
    }

    /// Start a query against `collection`
    pub fn handle(&self, collection: impl Into<String>) -> QueryHandle {
        QueryHandle {
            spec: QuerySpec::new(collection),
            executor: Arc::clone(&self.executor),
        }
    }

    /// Name of the bound engine
    pub fn engine(&self) -> &'static str {
        self.executor.engine()
    }
}

/// A pending query: a spec plus the executor that will run it
#[must_use = "a query handle does nothing until it is awaited or executed"]
pub struct QueryHandle {
    spec: QuerySpec,
    executor: Arc<dyn Executor>,
}

impl fmt::Debug for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHandle")
            .field("spec", &self.spec)
            .field("engine", &self.executor.engine())
            .finish()
    }
}

impl QueryHandle {
    fn map(mut self, f: impl FnOnce(QuerySpec) -> QuerySpec) -> Self {
        self.spec = f(self.spec);
        self
    }

    /// Advisory field selection, e.g. `"id, name"` or `"*"`
    pub fn select(self, columns: &str) -> Self {
        self.map(|s| s.select(columns))
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.map(|s| s.eq(field, value))
    }

    pub fn neq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.map(|s| s.neq(field, value))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.map(|s| s.gt(field, value))
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.map(|s| s.gte(field, value))
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.map(|s| s.lt(field, value))
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.map(|s| s.lte(field, value))
    }

    /// Membership filter; an empty list matches nothing without any I/O
    pub fn in_list<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.map(|s| s.in_list(field, values))
    }

    /// Ordering key. Keys beyond the first are best-effort and ignored by
    /// the tree store unless secondary emulation is configured.
    pub fn order(self, field: impl Into<String>, ascending: bool) -> Self {
        self.map(|s| s.order(field, ascending))
    }

    pub fn limit(self, n: usize) -> Self {
        self.map(|s| s.limit(n))
    }

    pub fn single(self) -> Self {
        self.map(QuerySpec::single)
    }

    pub fn insert(self, payload: impl Into<InsertPayload>) -> Self {
        self.map(|s| s.insert(payload))
    }

    pub fn update(self, patch: Record) -> Self {
        self.map(|s| s.update(patch))
    }

    pub fn delete(self) -> Self {
        self.map(QuerySpec::delete)
    }

    /// The spec built so far
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// Run the query. Equivalent to awaiting the handle.
    ///
    /// A panicking backend is reported as a `backend_error` envelope.
    pub async fn execute(self) -> ResultEnvelope {
        let QueryHandle { spec, executor } = self;
        let engine = executor.engine();

        // Covers panics while building the future as well as while polling it
        let run = async move { executor.execute(spec).await };
        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(envelope) => envelope,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(engine, %message, "executor panicked");
                ResultEnvelope::failure(StoreError::backend(message))
            }
        }
    }
}

impl IntoFuture for QueryHandle {
    type Output = ResultEnvelope;
    type IntoFuture = ExecuteFuture<'static>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "executor panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ErrorKind;
    use crate::query::SpecKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every spec it is asked to run
    #[derive(Default)]
    struct RecordingExecutor {
        calls: AtomicUsize,
        last: Mutex<Option<QuerySpec>>,
    }

    impl Executor for Arc<RecordingExecutor> {
        fn execute(&self, spec: QuerySpec) -> ExecuteFuture<'_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(spec);
            Box::pin(async { ResultEnvelope::many(Vec::new()) })
        }

        fn engine(&self) -> &'static str {
            "recording"
        }
    }

    struct PanickingExecutor;

    fn uninitialized_store() -> ResultEnvelope {
        panic!("store not initialized")
    }

    impl Executor for PanickingExecutor {
        fn execute(&self, _spec: QuerySpec) -> ExecuteFuture<'_> {
            Box::pin(async { uninitialized_store() })
        }

        fn engine(&self) -> &'static str {
            "panicking"
        }
    }

    struct EagerPanickingExecutor;

    impl Executor for EagerPanickingExecutor {
        fn execute(&self, _spec: QuerySpec) -> ExecuteFuture<'_> {
            panic!("connection pool not initialized")
        }

        fn engine(&self) -> &'static str {
            "eager-panicking"
        }
    }

    fn add_route_scope(handle: QueryHandle, route: &str) -> QueryHandle {
        handle.eq("route_id", route).order("departs_at", true)
    }

    #[tokio::test]
    async fn test_chaining_performs_no_io() {
        let recorder = Arc::new(RecordingExecutor::default());
        let db = Database::new(Arc::clone(&recorder));

        let handle = db.handle("dispatches").eq("status", "queued");
        let handle = add_route_scope(handle, "R7").limit(10);
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(handle.spec().filters.len(), 2);

        let env = handle.await;
        assert!(env.is_ok());
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);

        let spec = recorder.last.lock().unwrap().clone().unwrap();
        assert_eq!(spec.collection, "dispatches");
        assert_eq!(spec.limit, Some(10));
        assert_eq!(spec.orderings[0].field, "departs_at");
    }

    #[tokio::test]
    async fn test_explicit_execute_matches_await() {
        let recorder = Arc::new(RecordingExecutor::default());
        let db = Database::new(Arc::clone(&recorder));

        let env = db.handle("badges").single().delete().execute().await;
        assert!(env.is_ok());

        let spec = recorder.last.lock().unwrap().clone().unwrap();
        assert_eq!(spec.kind(), SpecKind::Delete);
        assert!(spec.single);
        assert_eq!(db.engine(), "recording");
    }

    #[tokio::test]
    async fn test_panic_becomes_backend_error() {
        let db = Database::new(PanickingExecutor);
        let env = db.handle("x").await;

        assert!(env.data.is_none());
        let err = env.error.unwrap();
        assert_eq!(err.kind, ErrorKind::BackendError);
        assert!(err.message.contains("store not initialized"));
    }

    #[tokio::test]
    async fn test_panic_building_future_becomes_backend_error() {
        let db = Database::new(EagerPanickingExecutor);
        let env = db.handle("x").execute().await;

        assert!(env.data.is_none());
        let err = env.error.unwrap();
        assert_eq!(err.kind, ErrorKind::BackendError);
        assert!(err.message.contains("connection pool not initialized"));
    }

    #[test]
    fn test_debug_shows_spec_and_engine() {
        let db = Database::new(Arc::new(RecordingExecutor::default()));
        let out = format!("{:?}", db.handle("routes").eq("code", "A"));
        assert!(out.contains("QueryHandle"));
        assert!(out.contains("routes"));
        assert!(out.contains("recording"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = StoreConfig {
            in_chunk_size: 0,
            ..StoreConfig::default()
        };
        let store = Arc::new(crate::store::MemoryDocumentStore::new());
        assert!(Database::document(store, config).is_err());
    }
}
