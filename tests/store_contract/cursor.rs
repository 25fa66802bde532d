//! Lazy cursor behavior and native cursor release.

use crate::*;

fn seed(store: &Store, count: i64) {
    let batch = (0..count)
        .map(|n| task(store, &format!("t{}", n), n, "odd", 0).into())
        .collect();
    store.put_all(batch).unwrap();
}

fn all_tasks() -> Query<Key> {
    Query::key_query_builder()
        .kind("Task")
        .order_by(OrderBy::asc("num"))
        .build()
        .unwrap()
}

#[test]
fn test_datastore_cursor_released_on_exhaustion() {
    let (store, client) = datastore_with_client();
    seed(&store, 3);
    let mut results = store.run(&all_tasks()).unwrap();
    assert_eq!(client.open_cursors(), 1);

    let mut count = 0;
    while results.next_result().unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 3);
    assert!(results.is_exhausted());
    assert_eq!(client.open_cursors(), 0);
}

#[test]
fn test_docstore_cursor_released_on_exhaustion() {
    let (store, client) = docstore_with_client();
    seed(&store, 3);
    let results = store.run(&all_tasks()).unwrap();
    assert_eq!(client.open_cursors(), 1);
    assert_eq!(results.count(), 3);
    assert_eq!(client.open_cursors(), 0);
}

#[test]
fn test_cursor_released_on_early_drop() {
    let (datastore, datastore_client) = datastore_with_client();
    let (docstore, docstore_client) = docstore_with_client();
    seed(&datastore, 4);
    seed(&docstore, 4);

    {
        let mut a = datastore.run(&all_tasks()).unwrap();
        let mut b = docstore.run(&all_tasks()).unwrap();
        assert!(a.next_result().unwrap().is_some());
        assert!(b.next_result().unwrap().is_some());
        assert_eq!(datastore_client.open_cursors(), 1);
        assert_eq!(docstore_client.open_cursors(), 1);
    }
    assert_eq!(datastore_client.open_cursors(), 0);
    assert_eq!(docstore_client.open_cursors(), 0);
}

#[test]
fn test_explicit_release() {
    let (store, client) = docstore_with_client();
    seed(&store, 2);
    let mut results = store.run(&all_tasks()).unwrap();
    results.release();
    assert_eq!(client.open_cursors(), 0);
    assert!(!results.has_next().unwrap());
    assert!(results.next_result().unwrap().is_none());
}

#[test]
fn test_has_next_does_not_consume() {
    for store in stores() {
        seed(&store, 2);
        let mut results = store.run(&all_tasks()).unwrap();
        assert!(results.has_next().unwrap());
        assert!(results.has_next().unwrap());
        assert_eq!(results.next_result().unwrap().unwrap().name(), Some("t0"));
        assert_eq!(results.next_result().unwrap().unwrap().name(), Some("t1"));
        assert!(!results.has_next().unwrap());
        assert!(results.next_result().unwrap().is_none());
    }
}

#[test]
fn test_empty_result() {
    for store in stores() {
        let mut results = store.run(&all_tasks()).unwrap();
        assert!(!results.has_next().unwrap());
        assert!(results.is_exhausted());
    }
}
