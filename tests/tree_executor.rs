//! Tree Store Executor Tests
//!
//! Reads resolve through one native window plus client-side filtering;
//! mutations are sequential and non-atomic.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{drivers, ids, rec, tree_db, tree_with, vehicles};
use duostore::executor::{CREATED_AT, UPDATED_AT};
use duostore::query::{FilterCondition, FilterOperator, PredicateFilter};
use duostore::store::MemoryTree;
use duostore::{Database, ErrorKind, StoreConfig};
use serde_json::{json, Value};

// =============================================================================
// Reads
// =============================================================================

/// Filter, order by name, limit 2: the two alphabetically-first OP1 vehicles.
#[tokio::test]
async fn test_vehicles_scenario() {
    let store = tree_with("vehicles", &vehicles());
    let db = tree_db(&store);

    let env = db
        .handle("vehicles")
        .eq("operator_id", "OP1")
        .order("name", true)
        .limit(2)
        .await;

    assert!(env.is_ok());
    assert_eq!(ids(&env), ["v3", "v4"]);
    assert_eq!(store.read_count(), 1);
}

/// Executor output equals filtering the whole collection in memory.
#[tokio::test]
async fn test_filter_equivalence_with_oracle() {
    let store = tree_with("vehicles", &vehicles());
    let db = tree_db(&store);

    let filter_sets = vec![
        vec![FilterCondition::eq("operator_id", json!("OP1"))],
        vec![
            FilterCondition::new("seats", FilterOperator::Gte, json!(30)),
            FilterCondition::new("operator_id", FilterOperator::Neq, json!("OP2")),
        ],
        vec![FilterCondition::in_list("name", vec![json!("Bravo"), json!("Metro"), json!("Nope")])],
        vec![FilterCondition::new("seats", FilterOperator::Lt, json!(20))],
        vec![],
    ];

    for filters in filter_sets {
        let expected: Vec<String> = vehicles()
            .into_iter()
            .filter_map(|(id, value)| {
                let mut record = rec(value);
                record.insert("id".into(), json!(id));
                PredicateFilter::matches(&record, &filters).then(|| id.to_string())
            })
            .collect();

        let handle = filters
            .iter()
            .fold(db.handle("vehicles"), |h, f| match f.operator {
                FilterOperator::Eq => h.eq(f.field.as_str(), f.value.clone()),
                FilterOperator::Neq => h.neq(f.field.as_str(), f.value.clone()),
                FilterOperator::Gt => h.gt(f.field.as_str(), f.value.clone()),
                FilterOperator::Gte => h.gte(f.field.as_str(), f.value.clone()),
                FilterOperator::Lt => h.lt(f.field.as_str(), f.value.clone()),
                FilterOperator::Lte => h.lte(f.field.as_str(), f.value.clone()),
                FilterOperator::In => h.in_list(
                    f.field.as_str(),
                    f.members().unwrap_or_default().to_vec(),
                ),
            });

        let env = handle.await;
        assert!(env.is_ok());
        assert_eq!(ids(&env), expected, "filters: {:?}", filters);
    }
}

/// Descending order with no filters uses the last-N window, newest first.
#[tokio::test]
async fn test_descending_limit() {
    let store = tree_with("vehicles", &vehicles());
    let db = tree_db(&store);

    let env = db.handle("vehicles").order("name", false).limit(2).await;
    assert_eq!(ids(&env), ["v1", "v4"]);
}

/// Without an ordering, results come back in key order.
#[tokio::test]
async fn test_unordered_limit_is_key_prefix() {
    let store = tree_with("vehicles", &vehicles());
    let db = tree_db(&store);

    let env = db.handle("vehicles").limit(3).await;
    assert_eq!(ids(&env), ["v1", "v2", "v3"]);
}

/// Orderings past the first are ignored unless emulation is configured.
#[tokio::test]
async fn test_secondary_ordering() {
    let store = tree_with("vehicles", &vehicles());

    let db = tree_db(&store);
    let env = db
        .handle("vehicles")
        .order("operator_id", true)
        .order("name", false)
        .await;
    assert_eq!(ids(&env), ["v1", "v3", "v4", "v2", "v5"]);

    let config = StoreConfig {
        emulate_secondary_order: true,
        ..StoreConfig::default()
    };
    let db = Database::tree(store.clone(), config).unwrap();
    let env = db
        .handle("vehicles")
        .order("operator_id", true)
        .order("name", false)
        .await;
    assert_eq!(ids(&env), ["v1", "v4", "v3", "v2", "v5"]);
}

/// Empty membership short-circuits with no backend read.
#[tokio::test]
async fn test_empty_in_list() {
    let store = tree_with("vehicles", &vehicles());
    let db = tree_db(&store);

    let env = db.handle("vehicles").in_list("id", Vec::<Value>::new()).await;
    assert!(env.is_ok());
    assert!(env.records().is_empty());

    let env = db
        .handle("vehicles")
        .in_list("id", Vec::<Value>::new())
        .single()
        .await;
    assert_eq!(env.error_kind(), Some(ErrorKind::NotFound));

    assert_eq!(store.read_count(), 0);
}

#[tokio::test]
async fn test_single_missing_is_not_found() {
    let store = tree_with("x", &vehicles());
    let db = tree_db(&store);

    let env = db.handle("x").eq("id", "missing").single().await;
    assert!(env.data.is_none());
    assert_eq!(env.error_kind(), Some(ErrorKind::NotFound));
}

/// single() with several matches returns the first in key order.
#[tokio::test]
async fn test_single_tie_break_by_key() {
    let store = tree_with("vehicles", &vehicles());
    let db = tree_db(&store);

    let env = db.handle("vehicles").eq("operator_id", "OP1").single().await;
    assert_eq!(env.record().unwrap()["id"], "v1");
}

#[tokio::test]
async fn test_select_projection() {
    let store = tree_with("vehicles", &vehicles());
    let db = tree_db(&store);

    let env = db.handle("vehicles").select("name").eq("id", "v2").single().await;
    assert_eq!(env.record().cloned(), Some(rec(json!({"id": "v2", "name": "Coaster"}))));

    let env = db
        .handle("vehicles")
        .select("*, operator:operators(name)")
        .eq("id", "v2")
        .await;
    assert_eq!(env.records()[0]["seats"], 30);
}

#[tokio::test]
async fn test_missing_collection_reads_empty() {
    let db = tree_db(&Arc::new(MemoryTree::new()));
    let env = db.handle("routes").await;
    assert!(env.is_ok());
    assert!(env.records().is_empty());
}

#[tokio::test]
async fn test_offline_is_backend_error() {
    let store = tree_with("vehicles", &vehicles());
    store.set_offline(true);
    let db = tree_db(&store);

    let env = db.handle("vehicles").await;
    let err = env.error.unwrap();
    assert_eq!(err.kind, ErrorKind::BackendError);
    assert_eq!(err.code.as_deref(), Some("unavailable"));
}

// =============================================================================
// Inserts
// =============================================================================

#[tokio::test]
async fn test_insert_generates_distinct_ids() {
    let store = Arc::new(MemoryTree::new());
    let db = tree_db(&store);
    let payload = rec(json!({"name": "Ana"}));

    let first = db.handle("drivers").insert(payload.clone()).await;
    let second = db.handle("drivers").insert(payload).await;

    let a = first.record().unwrap()["id"].as_str().unwrap().to_string();
    let b = second.record().unwrap()["id"].as_str().unwrap().to_string();
    assert!(!a.is_empty());
    assert_ne!(a, b);

    let stored = store.snapshot(&format!("drivers/{}", a)).unwrap().unwrap();
    assert_eq!(stored["name"], "Ana");
    assert!(stored.get(CREATED_AT).is_some());
    assert!(stored.get(UPDATED_AT).is_some());
}

#[tokio::test]
async fn test_insert_many_keeps_supplied_ids_and_created_at() {
    let store = Arc::new(MemoryTree::new());
    let db = tree_db(&store);

    let rows = vec![
        rec(json!({"id": "route-1", "code": "A", "created_at": "2020-01-01T00:00:00.000Z"})),
        rec(json!({"code": "B"})),
    ];
    let env = db.handle("routes").insert(rows).await;

    let written = env.records();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0]["id"], "route-1");
    assert_eq!(written[0][CREATED_AT], "2020-01-01T00:00:00.000Z");
    assert!(written[0].get(UPDATED_AT).is_some());
    assert_eq!(store.write_count(), 2);
}

#[tokio::test]
async fn test_insert_under_tree_root() {
    let store = Arc::new(MemoryTree::new());
    let config = StoreConfig {
        tree_root: Some("stations/central".into()),
        ..StoreConfig::default()
    };
    let db = Database::tree(store.clone(), config).unwrap();

    db.handle("badges")
        .insert(rec(json!({"id": "b1", "holder": "Ana"})))
        .await;

    assert!(store.snapshot("stations/central/badges/b1").unwrap().is_some());
    let env = db.handle("badges").eq("holder", "Ana").await;
    assert_eq!(ids(&env), ["b1"]);
}

// =============================================================================
// Updates and deletes
// =============================================================================

/// No filter means every record is a target.
#[tokio::test]
async fn test_update_without_filter_matches_all() {
    let store = tree_with("drivers", &drivers());
    let db = tree_db(&store);

    let env = db
        .handle("drivers")
        .update(rec(json!({"isActive": false})))
        .await;

    assert_eq!(env.records().len(), 3);
    assert!(env.records().iter().all(|r| r["isActive"] == false));
    assert!(env.records().iter().all(|r| r.get(UPDATED_AT).is_some()));

    let after = db.handle("drivers").eq("isActive", true).await;
    assert!(after.records().is_empty());
}

#[tokio::test]
async fn test_update_nothing_matched() {
    let store = tree_with("drivers", &drivers());
    let db = tree_db(&store);

    let env = db
        .handle("drivers")
        .eq("name", "Zed")
        .update(rec(json!({"isActive": false})))
        .await;

    assert_eq!(env.error_kind(), Some(ErrorKind::NotFound));
    assert_eq!(store.write_count(), 0);
}

/// A failure part-way leaves earlier writes applied and later ones untried.
#[tokio::test]
async fn test_update_is_not_atomic() {
    let store = tree_with("drivers", &drivers());
    let db = tree_db(&store);
    store.fail_writes_after(1);

    let env = db
        .handle("drivers")
        .update(rec(json!({"isActive": false})))
        .await;
    let err = env.error.unwrap();
    assert_eq!(err.kind, ErrorKind::BackendError);
    assert_eq!(err.code.as_deref(), Some("write-failed"));

    let active: Vec<bool> = ["d1", "d2", "d3"]
        .iter()
        .map(|key| {
            store.snapshot(&format!("drivers/{}", key)).unwrap().unwrap()["isActive"]
                .as_bool()
                .unwrap()
        })
        .collect();
    assert_eq!(active, [false, true, true]);
}

#[tokio::test]
async fn test_delete_scoped_by_filter() {
    let store = tree_with("vehicles", &vehicles());
    let db = tree_db(&store);

    let env = db.handle("vehicles").eq("operator_id", "OP1").delete().await;
    assert!(env.is_ok());
    assert!(env.data.is_none());

    let remaining: HashSet<String> = ids(&db.handle("vehicles").await).into_iter().collect();
    assert_eq!(remaining, HashSet::from(["v2".to_string(), "v5".to_string()]));

    let env = db.handle("vehicles").eq("operator_id", "OP1").delete().await;
    assert_eq!(env.error_kind(), Some(ErrorKind::NotFound));
}

/// Insert ignores filters chained before it.
#[tokio::test]
async fn test_insert_ignores_filters() {
    let store = Arc::new(MemoryTree::new());
    let db = tree_db(&store);

    let env = db
        .handle("routes")
        .eq("code", "never")
        .insert(rec(json!({"code": "A"})))
        .await;
    assert!(env.is_ok());
    assert_eq!(env.record().unwrap()["code"], "A");
}
