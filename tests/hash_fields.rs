//! Hash Field Tests
//!
//! Tests for nested hash fields through the whole stack:
//! - Subkey writes are indexed per (field, subkey, value)
//! - Overwrites deindex the old value before the new one lands
//! - Collections filter on `field__subkey` paths
//! - The hash command surface mirrors the store's semantics

use keeldb::{MemoryStore, ModelSchema};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn email_schema() -> ModelSchema {
    ModelSchema::builder("email")
        .field("subject", true)
        .hash_field("headers", true)
        .build()
        .unwrap()
}

// =============================================================================
// Filtering on Subkeys
// =============================================================================

/// Collections filter on hash subkey paths through the subkey's index.
#[test]
fn test_filter_on_hash_subkey() {
    let store = MemoryStore::new();
    let schema = email_schema();

    schema
        .create(
            &store,
            &[("headers", json!({"from": "you@moon.io", "to": "someone@cassini.io"}))],
        )
        .unwrap();
    schema
        .create(
            &store,
            &[("headers", json!({"from": "you@mars.io", "to": "someone@cassini.io"}))],
        )
        .unwrap();
    schema
        .create(
            &store,
            &[("headers", json!({"from": "you@mars.io", "to": "me@world.org"}))],
        )
        .unwrap();

    let from_mars = schema
        .collection(&store)
        .filter("headers__from", "you@mars.io")
        .unwrap()
        .members()
        .unwrap();
    assert_eq!(from_mars.pks(), vec!["2", "3"]);

    let narrowed = schema
        .collection(&store)
        .filter("headers__from", "you@mars.io")
        .unwrap()
        .filter("headers__to", "me@world.org")
        .unwrap()
        .members()
        .unwrap();
    assert_eq!(narrowed, vec!["3"]);

    let suffixed = schema
        .collection(&store)
        .filter("headers__from__eq", "you@mars.io")
        .unwrap()
        .members()
        .unwrap();
    assert_eq!(suffixed.pks(), from_mars.pks());
}

/// Setting a subkey later indexes it; overwriting reindexes it.
#[test]
fn test_hset_indexes_and_reindexes() {
    let store = MemoryStore::new();
    let schema = email_schema();
    let email = schema.create(&store, &[]).unwrap();

    email
        .hset("headers", "from", &json!("someone@cassini.io"))
        .unwrap();
    assert_eq!(
        schema
            .collection(&store)
            .filter("headers__from", "someone@cassini.io")
            .unwrap()
            .members()
            .unwrap(),
        vec![email.pk()]
    );

    email
        .hset("headers", "from", &json!("someoneelse@cassini.io"))
        .unwrap();
    assert!(schema
        .collection(&store)
        .filter("headers__from", "someone@cassini.io")
        .unwrap()
        .members()
        .unwrap()
        .is_empty());
    assert_eq!(
        schema
            .collection(&store)
            .filter("headers__from", "someoneelse@cassini.io")
            .unwrap()
            .members()
            .unwrap(),
        vec![email.pk()]
    );
}

/// hmset indexes every changed subkey.
#[test]
fn test_hmset_indexes_each_subkey() {
    let store = MemoryStore::new();
    let schema = email_schema();
    let email = schema.create(&store, &[]).unwrap();

    email
        .hmset(
            "headers",
            &[("from", json!("foo@bar.com")), ("to", json!("me@world.org"))],
        )
        .unwrap();

    assert_eq!(
        schema
            .collection(&store)
            .filter("headers__from", "foo@bar.com")
            .unwrap()
            .members()
            .unwrap(),
        vec![email.pk()]
    );
    assert_eq!(
        schema
            .collection(&store)
            .filter("headers__to", "me@world.org")
            .unwrap()
            .members()
            .unwrap(),
        vec![email.pk()]
    );

    // Overwrite one subkey and verify the old value was deindexed
    email.hmset("headers", &[("from", json!("you@mars.io"))]).unwrap();
    assert!(schema
        .collection(&store)
        .filter("headers__from", "foo@bar.com")
        .unwrap()
        .members()
        .unwrap()
        .is_empty());
    assert_eq!(
        schema
            .collection(&store)
            .filter("headers__from", "you@mars.io")
            .unwrap()
            .members()
            .unwrap(),
        vec![email.pk()]
    );
}

/// Deleting subkeys removes their index entries; others stay.
#[test]
fn test_hdel_deindexes() {
    let store = MemoryStore::new();
    let schema = email_schema();
    let email = schema
        .create(
            &store,
            &[("headers", json!({"from": "foo@bar.com", "to": "me@world.org"}))],
        )
        .unwrap();

    let removed = email.hdel("headers", &["from", "cc"]).unwrap();
    assert_eq!(removed, 1);

    assert!(schema
        .collection(&store)
        .filter("headers__from", "foo@bar.com")
        .unwrap()
        .members()
        .unwrap()
        .is_empty());
    assert_eq!(
        schema
            .collection(&store)
            .filter("headers__to", "me@world.org")
            .unwrap()
            .members()
            .unwrap(),
        vec![email.pk()]
    );
}

/// Counter subkeys stay queryable through every increment.
#[test]
fn test_hincrby_keeps_index_current() {
    let store = MemoryStore::new();
    let schema = email_schema();
    let email = schema.create(&store, &[]).unwrap();

    email.hincrby("headers", "Message-ID", 1).unwrap();
    assert_eq!(
        schema
            .collection(&store)
            .filter("headers__Message-ID", 1)
            .unwrap()
            .members()
            .unwrap(),
        vec![email.pk()]
    );

    email.hincrby("headers", "Message-ID", 1).unwrap();
    assert!(schema
        .collection(&store)
        .filter("headers__Message-ID", 1)
        .unwrap()
        .members()
        .unwrap()
        .is_empty());
    assert_eq!(
        schema
            .collection(&store)
            .filter("headers__Message-ID", 2)
            .unwrap()
            .members()
            .unwrap(),
        vec![email.pk()]
    );
}

// =============================================================================
// Hash Command Surface
// =============================================================================

/// Reads mirror what was written.
#[test]
fn test_hash_reads() {
    let store = MemoryStore::new();
    let schema = email_schema();
    let email = schema
        .create(
            &store,
            &[(
                "headers",
                json!({"from": "foo@bar.com", "to": "me@world.org", "cc": "someone@else.org"}),
            )],
        )
        .unwrap();

    assert_eq!(
        email.hget("headers", "from").unwrap(),
        Some("foo@bar.com".to_string())
    );
    assert_eq!(
        email.hmget("headers", &["to", "from"]).unwrap(),
        vec![
            Some("me@world.org".to_string()),
            Some("foo@bar.com".to_string())
        ]
    );
    assert_eq!(email.hlen("headers").unwrap(), 3);
    assert!(email.hexists("headers", "from").unwrap());
    assert!(!email.hexists("headers", "bcc").unwrap());

    let mut keys = email.hkeys("headers").unwrap();
    keys.sort();
    assert_eq!(keys, vec!["cc", "from", "to"]);

    let scanned = email.hscan("headers", "fr*").unwrap();
    assert_eq!(
        scanned,
        vec![("from".to_string(), "foo@bar.com".to_string())]
    );
}

/// Deleting the whole field clears storage and all subkey indexes.
#[test]
fn test_unset_whole_hash_field() {
    let store = MemoryStore::new();
    let schema = email_schema();
    let email = schema
        .create(
            &store,
            &[("headers", json!({"from": "foo@bar.com", "to": "me@world.org"}))],
        )
        .unwrap();

    email.unset("headers").unwrap();
    assert!(email.hgetall("headers").unwrap().is_empty());
    assert!(schema
        .collection(&store)
        .filter("headers__from", "foo@bar.com")
        .unwrap()
        .members()
        .unwrap()
        .is_empty());
}
