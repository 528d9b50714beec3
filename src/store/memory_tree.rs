//! In-memory tree store
//!
//! Reference [`TreeStore`] backed by one JSON tree behind a lock. Counts
//! calls and can inject write failures or go offline, which tests use to
//! observe the executor's I/O pattern and partial-failure behaviour.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use serde_json::{Map, Value};

use super::tree::{TreeLimit, TreeOrder, TreeStore, TreeWindow};
use super::StoreFuture;
use crate::errors::{StoreError, StoreResult};
use crate::query::{Record, ResultSorter};

const UNLIMITED: usize = usize::MAX;

/// In-memory hierarchical store
pub struct MemoryTree {
    root: RwLock<Value>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    /// Writes still allowed before injected failures start
    write_budget: AtomicUsize,
    offline: AtomicBool,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::with_root(Value::Object(Map::new()))
    }

    /// Start from an existing tree, e.g. a JSON export
    pub fn with_root(root: Value) -> Self {
        Self {
            root: RwLock::new(root),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            write_budget: AtomicUsize::new(UNLIMITED),
            offline: AtomicBool::new(false),
        }
    }

    /// Number of `read` calls served so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of successful writes (`set`, `update`, `remove`)
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Let `n` more writes succeed, then fail every following write
    pub fn fail_writes_after(&self, n: usize) {
        self.write_budget.store(n, Ordering::SeqCst);
    }

    /// Simulate a lost connection: every call fails
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Copy of the node at `path`, `None` when absent
    pub fn snapshot(&self, path: &str) -> StoreResult<Option<Value>> {
        let root = self.root.read()?;
        Ok(node(&root, path).cloned())
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::backend_with_code("client is offline", "unavailable"));
        }
        Ok(())
    }

    fn begin_write(&self) -> StoreResult<()> {
        self.check_online()?;
        let spent = self
            .write_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| match budget {
                0 => None,
                UNLIMITED => Some(UNLIMITED),
                n => Some(n - 1),
            });
        if spent.is_err() {
            return Err(StoreError::backend_with_code("write rejected", "write-failed"));
        }
        Ok(())
    }

    fn read_sync(&self, path: &str, window: &TreeWindow) -> StoreResult<Vec<(String, Value)>> {
        self.check_online()?;
        self.reads.fetch_add(1, Ordering::SeqCst);

        let root = self.root.read()?;
        let mut children: Vec<(String, Value)> = match node(&root, path) {
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => return Ok(Vec::new()),
        };
        drop(root);

        children.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(TreeOrder::Child(field)) = &window.order_by {
            // Stable: equal children stay in key order
            children.sort_by(|a, b| {
                ResultSorter::compare_values(
                    a.1.as_object().and_then(|o| o.get(field)),
                    b.1.as_object().and_then(|o| o.get(field)),
                )
            });
        }

        match window.limit {
            Some(TreeLimit::First(n)) => children.truncate(n),
            Some(TreeLimit::Last(n)) => {
                let skip = children.len().saturating_sub(n);
                children.drain(..skip);
            }
            None => {}
        }

        Ok(children)
    }

    fn set_sync(&self, path: &str, value: Value) -> StoreResult<()> {
        self.begin_write()?;
        let mut root = self.root.write()?;
        if value.is_null() {
            remove_node(&mut root, path);
        } else {
            *node_mut(&mut root, path) = value;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn update_sync(&self, path: &str, patch: Record) -> StoreResult<()> {
        self.begin_write()?;
        let mut root = self.root.write()?;
        let target = node_mut(&mut root, path);
        if !target.is_object() {
            *target = Value::Object(Map::new());
        }
        if let Value::Object(children) = target {
            for (key, value) in patch {
                if value.is_null() {
                    children.remove(&key);
                } else {
                    children.insert(key, value);
                }
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove_sync(&self, path: &str) -> StoreResult<()> {
        self.begin_write()?;
        let mut root = self.root.write()?;
        remove_node(&mut root, path);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl TreeStore for MemoryTree {
    fn read<'a>(
        &'a self,
        path: &'a str,
        window: TreeWindow,
    ) -> StoreFuture<'a, Vec<(String, Value)>> {
        Box::pin(async move { self.read_sync(path, &window) })
    }

    fn set<'a>(&'a self, path: &'a str, value: Value) -> StoreFuture<'a, ()> {
        Box::pin(async move { self.set_sync(path, value) })
    }

    fn update<'a>(&'a self, path: &'a str, patch: Record) -> StoreFuture<'a, ()> {
        Box::pin(async move { self.update_sync(path, patch) })
    }

    fn remove<'a>(&'a self, path: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move { self.remove_sync(path) })
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn node<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    segments(path).try_fold(root, |current, seg| current.as_object()?.get(seg))
}

/// Node at `path`, creating intermediate objects on the way
fn node_mut<'v>(root: &'v mut Value, path: &str) -> &'v mut Value {
    segments(path).fold(root, |current, seg| {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        // Missing children are inserted as null and promoted on the next step
        &mut current[seg]
    })
}

fn remove_node(root: &mut Value, path: &str) {
    let segs: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = segs.split_last() else {
        *root = Value::Object(Map::new());
        return;
    };

    let mut current = root;
    for seg in parents {
        current = match current.as_object_mut().and_then(|m| m.get_mut(*seg)) {
            Some(next) => next,
            None => return,
        };
    }
    if let Some(map) = current.as_object_mut() {
        map.remove(*last);
    }
}
