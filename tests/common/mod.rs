//! Shared fixtures for executor integration tests

#![allow(dead_code)]

use std::sync::Arc;

use duostore::query::ID_FIELD;
use duostore::store::{MemoryDocumentStore, MemoryTree};
use duostore::{Database, Record, ResultEnvelope, StoreConfig};
use serde_json::{json, Map, Value};

pub fn rec(value: Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}

/// Five vehicles, three of them run by OP1
pub fn vehicles() -> Vec<(&'static str, Value)> {
    vec![
        ("v1", json!({"name": "Sprinter", "operator_id": "OP1", "seats": 20})),
        ("v2", json!({"name": "Coaster", "operator_id": "OP2", "seats": 30})),
        ("v3", json!({"name": "Alpha", "operator_id": "OP1", "seats": 50})),
        ("v4", json!({"name": "Metro", "operator_id": "OP1", "seats": 40})),
        ("v5", json!({"name": "Bravo", "operator_id": "OP3", "seats": 45})),
    ]
}

pub fn drivers() -> Vec<(&'static str, Value)> {
    vec![
        ("d1", json!({"name": "Ana", "isActive": true})),
        ("d2", json!({"name": "Ben", "isActive": true})),
        ("d3", json!({"name": "Cleo", "isActive": true})),
    ]
}

/// Tree store holding `collection` under its key-per-record layout
pub fn tree_with(collection: &str, rows: &[(&str, Value)]) -> Arc<MemoryTree> {
    let children: Map<String, Value> = rows
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect();
    let mut root = Map::new();
    root.insert(collection.to_string(), Value::Object(children));
    Arc::new(MemoryTree::with_root(Value::Object(root)))
}

pub fn documents_with(collection: &str, rows: &[(&str, Value)]) -> Arc<MemoryDocumentStore> {
    let store = MemoryDocumentStore::new();
    for (id, value) in rows {
        store.put(collection, id, rec(value.clone())).unwrap();
    }
    Arc::new(store)
}

pub fn tree_db(store: &Arc<MemoryTree>) -> Database {
    Database::tree(store.clone(), StoreConfig::default()).unwrap()
}

pub fn document_db(store: &Arc<MemoryDocumentStore>) -> Database {
    Database::document(store.clone(), StoreConfig::default()).unwrap()
}

/// Ids of the returned records, in result order
pub fn ids(envelope: &ResultEnvelope) -> Vec<String> {
    envelope
        .records()
        .iter()
        .map(|r| r[ID_FIELD].as_str().unwrap_or_default().to_string())
        .collect()
}
