//! Tree store interface

use serde_json::Value;

use super::StoreFuture;
use crate::query::Record;

/// Native child ordering of a tree read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeOrder {
    /// Lexicographic child key order
    Key,
    /// Order by a field of each child, ties broken by key
    Child(String),
}

/// Native pagination of a tree read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeLimit {
    /// First `n` children in native order
    First(usize),
    /// Last `n` children, still returned in ascending native order
    Last(usize),
}

/// The single ordered/paginated window a tree read may request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeWindow {
    pub order_by: Option<TreeOrder>,
    pub limit: Option<TreeLimit>,
}

impl TreeWindow {
    /// Whole subtree, key order
    pub fn all() -> Self {
        Self::default()
    }

    pub fn ordered(order_by: TreeOrder) -> Self {
        Self {
            order_by: Some(order_by),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: TreeLimit) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Hierarchical key-value store addressed by `/`-separated paths
pub trait TreeStore: Send + Sync {
    /// Children of the node at `path` as `(key, value)`, in native order.
    ///
    /// A missing node reads as no children.
    fn read<'a>(&'a self, path: &'a str, window: TreeWindow)
        -> StoreFuture<'a, Vec<(String, Value)>>;

    /// Replace the node at `path`
    fn set<'a>(&'a self, path: &'a str, value: Value) -> StoreFuture<'a, ()>;

    /// Merge `patch` into the children of the node at `path`; a null value
    /// removes that child
    fn update<'a>(&'a self, path: &'a str, patch: Record) -> StoreFuture<'a, ()>;

    /// Remove the node at `path`
    fn remove<'a>(&'a self, path: &'a str) -> StoreFuture<'a, ()>;
}
