//! Store Contract Test Suite
//!
//! Every test here runs against both in-process backends through the public
//! `Store` facade. A behavior that differs between backends is called out in
//! the test name.
//!
//! ## Running Tests
//!
//! ```bash
//! # Run the whole contract
//! cargo test --test store_contract
//!
//! # Query tests only
//! cargo test --test store_contract query::
//! ```

use std::sync::Arc;

use canonstore::datastore::MemoryDatastore;
use canonstore::docstore::MemoryDocumentStore;
use canonstore::prelude::*;
use canonstore::{QueryResultKind, MAX_PATH_LEN};

// Test modules
pub mod atomicity;
pub mod crud;
pub mod cursor;
pub mod model;
pub mod query;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Project every contract store is bound to
pub const PROJECT: &str = "contract-project";

/// Both backends
pub const BACKENDS: [BackendKind; 2] = [BackendKind::Datastore, BackendKind::Docstore];

/// One fresh in-memory store per backend
pub fn stores() -> Vec<Store> {
    BACKENDS
        .iter()
        .map(|backend| Store::in_memory(*backend, PROJECT))
        .collect()
}

/// Datastore-backed store sharing a client the test can inspect
pub fn datastore_with_client() -> (Store, Arc<MemoryDatastore>) {
    let client = Arc::new(MemoryDatastore::new());
    let store = Store::builder()
        .project_id(PROJECT)
        .datastore_client(client.clone())
        .open()
        .expect("Failed to open datastore-backed store");
    (store, client)
}

/// Docstore-backed store sharing a client the test can inspect
pub fn docstore_with_client() -> (Store, MemoryDocumentStore) {
    let client = MemoryDocumentStore::new();
    let store = Store::builder()
        .project_id(PROJECT)
        .document_client(Arc::new(client.clone()))
        .open()
        .expect("Failed to open docstore-backed store");
    (store, client)
}

/// Named `Task` key in the store's project
pub fn task_key(store: &Store, name: &str) -> Key {
    store
        .new_key_factory()
        .new_key_with_name("Task", name)
        .expect("valid key")
}

/// Task with a number, a category and a priority
pub fn task(store: &Store, name: &str, num: i64, category: &str, priority: i64) -> Entity {
    Entity::builder()
        .set("num", num)
        .set("category", category)
        .set("priority", priority)
        .build_entity(task_key(store, name))
}

/// Entity holding one property of every value kind
pub fn all_kinds_entity(store: &Store, name: &str) -> Entity {
    let owner = store
        .new_key_factory()
        .new_key("User")
        .ancestor(PathElement::with_name("Org", "acme"))
        .build_with_id(42)
        .expect("valid key");
    let nested = Entity::builder()
        .set("street", "Main")
        .set("number", 7i64)
        .build_full_entity(Some(EntityKey::Complete(task_key(store, "address"))));
    let keyless = Entity::builder().set("note", "no key").build_full_entity(None);
    let list = Value::list(vec![
        Value::long(1),
        Value::string("two"),
        Value::double(3.5),
        Value::boolean(false),
    ])
    .expect("flat list");

    Entity::builder()
        .set_null("nothing")
        .set("text", "hello world")
        .set("unicode", "日本語 🌍")
        .set("long", i64::MIN)
        .set("double", -2.71828)
        .set("flag", true)
        .set(
            "when",
            Timestamp::from_millis(1_700_000_000_123).expect("valid timestamp"),
        )
        .set("bytes", Value::blob(vec![0u8, 1, 2, 254, 255]))
        .set("owner", owner)
        .set("address", nested)
        .set("memo", keyless)
        .set("items", list)
        .build_entity(task_key(store, name))
}

/// Collect a query's results, failing the test on any error
pub fn collect<T: QueryResultKind>(store: &Store, query: &Query<T>) -> Vec<T> {
    store
        .run(query)
        .expect("query issued")
        .collect::<Result<Vec<T>>>()
        .expect("rows converted")
}

/// Names of keys, in order
pub fn names(keys: &[Key]) -> Vec<String> {
    keys.iter()
        .map(|key| key.name().unwrap_or_default().to_string())
        .collect()
}
