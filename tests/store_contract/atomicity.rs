//! What a failed batch leaves behind on each backend.

use crate::*;
use canonstore::datastore::MAX_INDEXED_BYTES;
use canonstore::Atomicity;

fn batch_keys(store: &Store) -> [Key; 3] {
    [
        task_key(store, "first"),
        task_key(store, "middle"),
        task_key(store, "last"),
    ]
}

#[test]
fn test_declared_atomicity() {
    let (datastore, _) = datastore_with_client();
    let (docstore, _) = docstore_with_client();
    assert_eq!(datastore.atomicity(), Atomicity::Atomic);
    assert_eq!(docstore.atomicity(), Atomicity::BestEffortSequential);
}

#[test]
fn test_datastore_failed_batch_writes_nothing() {
    let (store, client) = datastore_with_client();
    let [first, middle, last] = batch_keys(&store);
    let batch: Vec<FullEntity> = vec![
        Entity::builder().set("n", 1i64).build_entity(first.clone()).into(),
        Entity::builder()
            .set("text", "x".repeat(MAX_INDEXED_BYTES + 1))
            .build_entity(middle.clone())
            .into(),
        Entity::builder().set("n", 3i64).build_entity(last.clone()).into(),
    ];

    let err = store.put_all(batch).unwrap_err();
    assert!(err.is_backend());
    assert!(client.is_empty());
    assert!(store.get_all(&[first, middle, last]).unwrap().is_empty());
}

#[test]
fn test_datastore_unindexed_long_string_accepted() {
    let (store, _) = datastore_with_client();
    let key = task_key(&store, "long");
    let text = Value::string("x".repeat(MAX_INDEXED_BYTES + 1)).with_exclude_from_indexes(true);
    store
        .put(Entity::builder().set("text", text).build_entity(key.clone()))
        .unwrap();
    assert!(store.get(&key).unwrap().is_some());
}

#[test]
fn test_docstore_failed_batch_keeps_prefix() {
    let (store, client) = docstore_with_client();
    let [first, middle, last] = batch_keys(&store);
    let too_fine = Timestamp::of_seconds_and_nanos(1_700_000_000, 123_456_789).unwrap();
    let batch: Vec<FullEntity> = vec![
        Entity::builder().set("n", 1i64).build_entity(first.clone()).into(),
        Entity::builder().set("at", too_fine).build_entity(middle.clone()).into(),
        Entity::builder().set("n", 3i64).build_entity(last.clone()).into(),
    ];

    let err = store.put_all(batch).unwrap_err();
    assert!(err.is_invalid_request());
    assert_eq!(client.document_count(), 1);
    assert!(store.get(&first).unwrap().is_some());
    assert!(store.get(&middle).unwrap().is_none());
    assert!(store.get(&last).unwrap().is_none());
}

#[test]
fn test_millisecond_timestamps_accepted_everywhere() {
    for store in stores() {
        let at = Timestamp::from_millis(-86_400_001).unwrap();
        let key = task_key(&store, "dated");
        store
            .put(Entity::builder().set("at", at).build_entity(key.clone()))
            .unwrap();
        let loaded = store.get(&key).unwrap().unwrap();
        assert_eq!(loaded.get_timestamp("at").unwrap(), at);
    }
}
