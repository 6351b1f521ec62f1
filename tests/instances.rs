//! Instance Materialization Tests
//!
//! Tests for the instance output mode:
//! - Checked materialization verifies each pk and drops stale entries
//! - Lazy materialization skips the checks and keeps everything
//! - Output-mode switches cancel each other
//! - The whole chain composes: filter, instances, sort, slice

use keeldb::query::SortOptions;
use keeldb::{MemoryStore, ModelSchema, Store};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn boat_schema() -> ModelSchema {
    ModelSchema::builder("boat")
        .field("name", true)
        .field("power", true)
        .field("launched", true)
        .field("length", false)
        .build()
        .unwrap()
}

fn seed_boats(store: &MemoryStore, schema: &ModelSchema) {
    for (name, power, length, launched) in [
        ("Pen Duick I", "sail", json!(15.1), 1898),
        ("Pen Duick II", "sail", json!(13.6), 1964),
        ("Pen Duick III", "sail", json!(17.45), 1966),
        ("Rainbow Warrior I", "engine", json!(40), 1955),
    ] {
        schema
            .create(
                store,
                &[
                    ("name", json!(name)),
                    ("power", json!(power)),
                    ("length", length),
                    ("launched", json!(launched)),
                ],
            )
            .unwrap();
    }
}

// =============================================================================
// Materialization Modes
// =============================================================================

/// Instance mode yields handles whose pks are all collection members.
#[test]
fn test_instances_returned() {
    let store = MemoryStore::new();
    let schema = boat_schema();
    seed_boats(&store, &schema);

    let results = schema.collection(&store).instances().members().unwrap();
    assert_eq!(results.len(), 4);
    for item in &results {
        let instance = item.instance().unwrap();
        assert!(instance.exists().unwrap());
    }
}

/// Checked mode costs one membership test per pk; lazy mode costs none.
#[test]
fn test_lazy_skips_existence_checks() {
    let store = MemoryStore::new();
    let schema = boat_schema();
    seed_boats(&store, &schema);

    // Checked: 1 fetch + 4 membership tests
    let before = store.commands_issued();
    schema.collection(&store).instances().members().unwrap();
    assert_eq!(store.commands_issued() - before, 5);

    // Lazy: 1 fetch only
    let before = store.commands_issued();
    schema.collection(&store).lazy_instances().members().unwrap();
    assert_eq!(store.commands_issued() - before, 1);
}

/// A stale index entry is dropped in checked mode and kept in lazy mode.
#[test]
fn test_stale_index_entry_handling() {
    let store = MemoryStore::new();
    let schema = boat_schema();
    seed_boats(&store, &schema);

    // Inject an index entry pointing at a record that does not exist
    store.sadd("boat:name:Pen Duick I", "9999").unwrap();

    let checked = schema
        .collection(&store)
        .filter("name", "Pen Duick I")
        .unwrap()
        .instances()
        .members()
        .unwrap();
    assert_eq!(checked.len(), 1);

    let lazy = schema
        .collection(&store)
        .filter("name", "Pen Duick I")
        .unwrap()
        .lazy_instances()
        .members()
        .unwrap();
    assert_eq!(lazy.len(), 2);
}

/// Materialization works through pure pk plans too.
#[test]
fn test_instances_with_pk_filters() {
    let store = MemoryStore::new();
    let schema = boat_schema();
    seed_boats(&store, &schema);

    let hit = schema
        .collection(&store)
        .filter("pk", 1)
        .unwrap()
        .instances()
        .members()
        .unwrap();
    assert_eq!(hit.len(), 1);
    assert_eq!(hit.get(0).unwrap().pk(), "1");

    let miss = schema
        .collection(&store)
        .filter("pk", 10)
        .unwrap()
        .instances()
        .members()
        .unwrap();
    assert!(miss.is_empty());

    let combined = schema
        .collection(&store)
        .filter("pk", 1)
        .unwrap()
        .filter("name", "Pen Duick I")
        .unwrap()
        .instances()
        .members()
        .unwrap();
    assert_eq!(combined.len(), 1);

    let wrong = schema
        .collection(&store)
        .filter("pk", 10)
        .unwrap()
        .filter("name", "Pen Duick I")
        .unwrap()
        .instances()
        .members()
        .unwrap();
    assert!(wrong.is_empty());
}

/// Switching back to primary keys cancels the instances transform.
#[test]
fn test_primary_keys_cancels_instances() {
    let store = MemoryStore::new();
    let schema = boat_schema();
    seed_boats(&store, &schema);

    let results = schema
        .collection(&store)
        .instances()
        .primary_keys()
        .members()
        .unwrap();
    assert_eq!(results.len(), 4);
    for item in &results {
        assert!(item.instance().is_none());
    }
}

// =============================================================================
// Full Chain
// =============================================================================

/// Filter, instances, sort, and slice compose on one collection.
#[test]
fn test_filter_sort_slice_instances_chain() {
    let store = MemoryStore::new();
    let schema = ModelSchema::builder("band")
        .field("name", true)
        .field("started_in", false)
        .field("genre", true)
        .build()
        .unwrap();
    for (name, started_in, genre) in [
        ("Madrugada", 1992, "Alternative"),
        ("Radiohead", 1985, "Alternative"),
        ("The Veils", 2001, "Alternative"),
        ("Archive", 1994, "Progressive Rock"),
    ] {
        schema
            .create(
                &store,
                &[
                    ("name", json!(name)),
                    ("started_in", json!(started_in)),
                    ("genre", json!(genre)),
                ],
            )
            .unwrap();
    }

    // Newest two alternative bands: The Veils (3), Madrugada (1)
    let newest = schema
        .collection(&store)
        .filter("genre", "Alternative")
        .unwrap()
        .instances()
        .sort(SortOptions::new().by("-started_in"))
        .range(0, Some(2))
        .unwrap();
    assert_eq!(newest.pks(), vec!["3", "1"]);
    assert!(newest.get(0).unwrap().instance().is_some());

    // Oldest two: Radiohead (2), Madrugada (1)
    let oldest = schema
        .collection(&store)
        .filter("genre", "Alternative")
        .unwrap()
        .instances()
        .sort(SortOptions::new().by("started_in"))
        .range(0, Some(2))
        .unwrap();
    assert_eq!(oldest.pks(), vec!["2", "1"]);

    // Random access agrees
    let first = schema
        .collection(&store)
        .filter("genre", "Alternative")
        .unwrap()
        .instances()
        .sort(SortOptions::new().by("started_in"))
        .get(0)
        .unwrap()
        .unwrap();
    assert_eq!(first.pk(), "2");
}

/// Instance handles read their record's live fields.
#[test]
fn test_instances_read_fields() {
    let store = MemoryStore::new();
    let schema = boat_schema();
    seed_boats(&store, &schema);

    let results = schema
        .collection(&store)
        .filter("launched", 1966)
        .unwrap()
        .instances()
        .members()
        .unwrap();
    let instance = results.get(0).unwrap().instance().unwrap();
    assert_eq!(instance.get("name").unwrap(), Some("Pen Duick III".to_string()));
    assert_eq!(instance.get("power").unwrap(), Some("sail".to_string()));
}
