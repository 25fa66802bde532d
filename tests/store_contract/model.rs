//! Key and value model rules, checked through both backends.

use crate::*;

fn ancestors(count: usize) -> Vec<PathElement> {
    (0..count)
        .map(|i| PathElement::with_id("Level", i as i64 + 1))
        .collect()
}

// =============================================================================
// Key paths
// =============================================================================

#[test]
fn test_deepest_key_round_trips() {
    for store in stores() {
        let key = store
            .new_key_factory()
            .new_key("Leaf")
            .ancestors(ancestors(MAX_PATH_LEN - 1))
            .build_with_name("bottom")
            .expect("path at the limit");
        assert_eq!(key.path().len(), MAX_PATH_LEN);

        let stored = store
            .put(Entity::builder().set("depth", MAX_PATH_LEN as i64).build_entity(key.clone()))
            .unwrap();
        assert_eq!(stored.key(), &key, "{}", store.backend_name());

        let loaded = store.get(&key).unwrap().expect("stored entity");
        assert_eq!(loaded.key().ancestors().len(), MAX_PATH_LEN - 1);
        assert_eq!(loaded.get_long("depth").unwrap(), MAX_PATH_LEN as i64);
    }
}

#[test]
fn test_key_past_path_limit_rejected() {
    for store in stores() {
        let err = store
            .new_key_factory()
            .new_key("Leaf")
            .ancestors(ancestors(MAX_PATH_LEN))
            .build_with_name("too-deep")
            .unwrap_err();
        assert!(err.is_invalid_request());
    }
}

#[test]
fn test_incomplete_key_is_not_a_key() {
    let store = Store::in_memory(BackendKind::Datastore, PROJECT);
    let incomplete = store.new_key_factory().new_incomplete_key("Task").unwrap();
    assert!(!incomplete.is_complete());
    assert!(Key::from_incomplete(incomplete).is_err());
}

#[test]
fn test_keys_carry_store_project_and_namespace() {
    for backend in BACKENDS {
        let store = Store::builder()
            .backend(backend)
            .project_id(PROJECT)
            .namespace("tenant-a")
            .open()
            .unwrap();
        let key = task_key(&store, "scoped");
        store.put(Entity::builder().build_entity(key.clone())).unwrap();

        let loaded = store.get(&key).unwrap().expect("stored entity");
        assert_eq!(loaded.key().project_id(), PROJECT);
        assert_eq!(loaded.key().namespace(), "tenant-a");
    }
}

// =============================================================================
// Values
// =============================================================================

#[test]
fn test_list_in_list_rejected() {
    let inner = Value::list(vec![Value::long(1)]).unwrap();
    let err = Value::list(vec![Value::long(0), inner]).unwrap_err();
    assert!(err.is_invalid_request());
}

#[test]
fn test_typed_getter_mismatch() {
    for store in stores() {
        let stored = store.put(task(&store, "typed", 3, "odd", 1)).unwrap();
        assert!(stored.get_string("num").is_err());
        assert!(stored.get_long("missing").is_err());
        assert_eq!(stored.get_string("category").unwrap(), "odd");
    }
}

// =============================================================================
// Property tests
// =============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn scalar_values_round_trip(
            name in "[a-zA-Z0-9_-]{1,24}",
            num in any::<i64>(),
            text in "\\PC{0,40}",
            flag in any::<bool>(),
            millis in -62_135_596_800_000i64..253_402_300_799_999i64,
        ) {
            for store in stores() {
                let at = Timestamp::from_millis(millis).unwrap();
                let entity = Entity::builder()
                    .set("num", num)
                    .set("text", text.as_str())
                    .set("flag", flag)
                    .set("at", at)
                    .build_entity(task_key(&store, &name));
                store.put(entity.clone()).unwrap();
                prop_assert_eq!(store.get(entity.key()).unwrap(), Some(entity));
            }
        }
    }
}
