//! Backing store abstractions
//!
//! Two structurally different engines sit behind the executors:
//!
//! - [`TreeStore`]: one hierarchical key-value tree. Collections are child
//!   nodes, records are grandchildren. One native ordered dimension with
//!   first-N/last-N pagination, no native filtering.
//! - [`DocumentStore`]: native multi-predicate queries, multi-field order,
//!   atomic batched writes, and at most 30 values per membership filter.
//!
//! Both traits are object safe and return boxed futures so that network
//! clients and the in-memory implementations plug in the same way.

mod document;
mod memory_document;
mod memory_tree;
mod tree;

use std::future::Future;
use std::pin::Pin;

use crate::errors::StoreResult;

/// Boxed future returned by backend operations
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

pub use document::{DocumentStore, NativeQuery, WriteBatch, WriteOp};
pub use memory_document::MemoryDocumentStore;
pub use memory_tree::MemoryTree;
pub use tree::{TreeLimit, TreeOrder, TreeStore, TreeWindow};
