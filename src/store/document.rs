//! Document store interface

use super::StoreFuture;
use crate::query::{FilterCondition, OrderCondition, Record};

/// One native query: pushed-down filters, order and limit
#[derive(Debug, Clone, PartialEq)]
pub struct NativeQuery {
    pub collection: String,
    pub filters: Vec<FilterCondition>,
    pub order_by: Vec<OrderCondition>,
    pub limit: Option<usize>,
}

impl NativeQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }
}

/// A single write inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or replace a document
    Set {
        collection: String,
        id: String,
        data: Record,
    },
    /// Merge fields into an existing document
    Merge {
        collection: String,
        id: String,
        patch: Record,
    },
    /// Remove a document
    Delete { collection: String, id: String },
}

/// Writes committed together: all succeed or none do
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, id: &str, data: Record) {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
    }

    pub fn merge(&mut self, collection: &str, id: &str, patch: Record) {
        self.ops.push(WriteOp::Merge {
            collection: collection.to_string(),
            id: id.to_string(),
            patch,
        });
    }

    pub fn delete(&mut self, collection: &str, id: &str) {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Collection-of-documents store with native querying
pub trait DocumentStore: Send + Sync {
    /// Run one native query. Returned records carry their document id
    /// under `id`.
    fn run_query(&self, query: NativeQuery) -> StoreFuture<'_, Vec<Record>>;

    /// Allocate a fresh document id in `collection`
    fn allocate_id(&self, collection: &str) -> String;

    /// Commit a batch atomically
    fn commit(&self, batch: WriteBatch) -> StoreFuture<'_, ()>;
}
