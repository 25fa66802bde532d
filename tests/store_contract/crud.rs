//! Put, get and delete through the facade.

use crate::*;

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn test_every_value_kind_round_trips() {
    for store in stores() {
        let entity = all_kinds_entity(&store, "everything");
        let stored = store.put(entity.clone()).unwrap();
        assert_eq!(stored, entity, "{} put result", store.backend_name());

        let loaded = store.get(entity.key()).unwrap().expect("stored entity");
        assert_eq!(loaded, entity, "{} get result", store.backend_name());
    }
}

#[test]
fn test_nested_entity_and_key_values() {
    for store in stores() {
        let entity = all_kinds_entity(&store, "nested");
        store.put(entity.clone()).unwrap();
        let loaded = store.get(entity.key()).unwrap().unwrap();

        let address = loaded.get_entity("address").unwrap();
        assert_eq!(address.get_string("street").unwrap(), "Main");
        assert!(matches!(address.key(), Some(EntityKey::Complete(_))));
        assert!(loaded.get_entity("memo").unwrap().key().is_none());

        let owner = loaded.get_key("owner").unwrap();
        assert_eq!(owner.id(), Some(42));
        assert_eq!(owner.ancestors()[0].name(), Some("acme"));

        let items = loaded.get_list("items").unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items.as_slice()[1].as_str(), Some("two"));
        assert!(loaded.is_null("nothing").unwrap());
    }
}

#[test]
fn test_missing_key_reads_none() {
    for store in stores() {
        assert!(store.get(&task_key(&store, "ghost")).unwrap().is_none());
    }
}

#[test]
fn test_overwrite_replaces_properties() {
    for store in stores() {
        store.put(task(&store, "t", 1, "odd", 9)).unwrap();
        let replacement = Entity::builder()
            .set("num", 2i64)
            .build_entity(task_key(&store, "t"));
        store.put(replacement).unwrap();

        let loaded = store.get(&task_key(&store, "t")).unwrap().unwrap();
        assert_eq!(loaded.get_long("num").unwrap(), 2);
        assert!(!loaded.contains("category"), "{}", store.backend_name());
    }
}

#[test]
fn test_put_all_returns_input_order() {
    for store in stores() {
        let batch: Vec<FullEntity> = ["c", "a", "b"]
            .iter()
            .enumerate()
            .map(|(i, name)| task(&store, name, i as i64, "odd", 0).into())
            .collect();
        let stored = store.put_all(batch).unwrap();
        assert_eq!(
            names(&stored.iter().map(|e| e.key().clone()).collect::<Vec<_>>()),
            vec!["c", "a", "b"]
        );
    }
}

// =============================================================================
// Delete
// =============================================================================

#[test]
fn test_delete_only_named_keys() {
    for store in stores() {
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            store.put(task(&store, name, i as i64, "odd", 0)).unwrap();
        }
        store
            .delete(&[task_key(&store, "a"), task_key(&store, "c"), task_key(&store, "zz")])
            .unwrap();

        let keys = [task_key(&store, "a"), task_key(&store, "b"), task_key(&store, "c")];
        let remaining = store.get_all(&keys).unwrap();
        assert_eq!(remaining.len(), 1, "{}", store.backend_name());
        assert_eq!(remaining[0].key().name(), Some("b"));
    }
}

// =============================================================================
// Keys without ids
// =============================================================================

#[test]
fn test_datastore_allocates_ids() {
    let store = Store::in_memory(BackendKind::Datastore, PROJECT);
    let key = store.new_key_factory().new_incomplete_key("Task").unwrap();
    let first = store
        .put(Entity::builder().set("n", 1i64).build_full_entity(Some(key.clone().into())))
        .unwrap();
    let second = store
        .put(Entity::builder().set("n", 2i64).build_full_entity(Some(key.into())))
        .unwrap();

    assert!(first.key().id().is_some());
    assert_ne!(first.key(), second.key());
    assert_eq!(store.get(first.key()).unwrap().unwrap().get_long("n").unwrap(), 1);
}

#[test]
fn test_docstore_rejects_incomplete_keys() {
    let (store, client) = docstore_with_client();
    let key = store.new_key_factory().new_incomplete_key("Task").unwrap();
    let err = store
        .put(Entity::builder().build_full_entity(Some(key.into())))
        .unwrap_err();
    assert!(err.is_invalid_request());
    assert_eq!(client.document_count(), 0);
}

#[test]
fn test_keyless_entity_rejected() {
    for store in stores() {
        let err = store
            .put(Entity::builder().set("n", 1i64).build_full_entity(None))
            .unwrap_err();
        assert!(err.is_invalid_request(), "{}", store.backend_name());
    }
}

// =============================================================================
// Stored document shape
// =============================================================================

#[test]
fn test_docstore_document_layout() {
    use bson::{doc, Bson};
    use canonstore::docstore::{DocumentClient, ID_FIELD, KEY_FIELD};

    let (store, client) = docstore_with_client();
    store.put(task(&store, "shape", 5, "odd", 2)).unwrap();

    let collection = client.collection(PROJECT, "", "Task").unwrap();
    let document = collection
        .find_one(&doc! { "num": 5i64 })
        .unwrap()
        .expect("stored document");
    assert!(matches!(document.get(ID_FIELD), Some(Bson::String(_))));
    assert!(matches!(document.get(KEY_FIELD), Some(Bson::Document(_))));
    assert_eq!(document.get_str("category").unwrap(), "odd");
    assert_eq!(document.get_i64("priority").unwrap(), 2);
}

#[test]
fn test_keyless_entity_shaped_like_key_value() {
    use canonstore::wire::encode_key;

    for store in stores() {
        let encoded = encode_key(&task_key(&store, "elsewhere")).unwrap();
        let lookalike = Entity::builder()
            .set("type", "key")
            .set("key", encoded.as_str())
            .build_full_entity(None);
        let entity = Entity::builder()
            .set("inner", lookalike)
            .build_entity(task_key(&store, "holder"));
        store.put(entity.clone()).unwrap();

        let loaded = store.get(entity.key()).unwrap().expect("stored entity");
        assert_eq!(loaded, entity, "{}", store.backend_name());
        let inner = loaded.get_entity("inner").unwrap();
        assert!(inner.key().is_none());
        assert_eq!(inner.get_string("type").unwrap(), "key");
    }
}
