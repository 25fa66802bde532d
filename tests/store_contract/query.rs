//! Queries that must answer the same on both backends.

use crate::*;

/// Five tasks: num 0..4, category by parity, priority descending with num.
fn seed(store: &Store) {
    let batch = (0..5i64)
        .map(|n| {
            let category = if n % 2 == 0 { "even" } else { "odd" };
            task(store, &format!("t{}", n), n, category, 10 - n).into()
        })
        .collect();
    store.put_all(batch).unwrap();
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_keys_only_descending() {
    for store in stores() {
        seed(&store);
        let query = Query::key_query_builder()
            .kind("Task")
            .order_by(OrderBy::desc("num"))
            .build()
            .unwrap();
        let keys = collect(&store, &query);
        assert_eq!(
            names(&keys),
            vec!["t4", "t3", "t2", "t1", "t0"],
            "{}",
            store.backend_name()
        );
    }
}

#[test]
fn test_entities_ascending_with_page() {
    for store in stores() {
        seed(&store);
        let query = Query::entity_query_builder()
            .kind("Task")
            .order_by(OrderBy::asc("num"))
            .offset(1)
            .limit(2)
            .build()
            .unwrap();
        let nums: Vec<i64> = collect(&store, &query)
            .iter()
            .map(|e| e.get_long("num").unwrap())
            .collect();
        assert_eq!(nums, vec![1, 2], "{}", store.backend_name());
    }
}

#[test]
fn test_zero_limit_rejected() {
    let err = Query::entity_query_builder()
        .kind("Task")
        .limit(0)
        .build()
        .unwrap_err();
    assert!(err.is_invalid_request());
}

// =============================================================================
// Filters
// =============================================================================

#[test]
fn test_ge_over_mixed_signs() {
    let mut answers = Vec::new();
    for store in stores() {
        for (name, num) in [("neg", -5i64), ("zero", 0), ("pos", 7), ("neg2", -1)] {
            store.put(task(&store, name, num, "odd", 0)).unwrap();
        }
        let query = Query::key_query_builder()
            .kind("Task")
            .filter(PropertyFilter::ge("num", 0i64))
            .build()
            .unwrap();
        let mut found = names(&collect(&store, &query));
        found.sort();
        answers.push(found);
    }
    assert_eq!(answers[0], vec!["pos", "zero"]);
    assert_eq!(answers[0], answers[1]);
}

#[test]
fn test_composite_and() {
    for store in stores() {
        seed(&store);
        let filter = CompositeFilter::and(
            PropertyFilter::ge("num", 1i64),
            [PropertyFilter::eq("category", "odd").into()],
        );
        let query = Query::key_query_builder()
            .kind("Task")
            .filter(filter)
            .order_by(OrderBy::asc("num"))
            .build()
            .unwrap();
        assert_eq!(names(&collect(&store, &query)), vec!["t1", "t3"]);
    }
}

#[test]
fn test_is_null_filter() {
    for store in stores() {
        seed(&store);
        store
            .put(
                Entity::builder()
                    .set_null("category")
                    .set("num", 99i64)
                    .build_entity(task_key(&store, "blank")),
            )
            .unwrap();
        let query = Query::key_query_builder()
            .kind("Task")
            .filter(PropertyFilter::is_null("category"))
            .build()
            .unwrap();
        assert_eq!(names(&collect(&store, &query)), vec!["blank"], "{}", store.backend_name());
    }
}

#[test]
fn test_kind_scopes_results() {
    for store in stores() {
        seed(&store);
        let other = store.new_key_factory().new_key_with_name("Note", "n").unwrap();
        store.put(Entity::builder().set("num", 1i64).build_entity(other)).unwrap();

        let query = Query::key_query_builder().kind("Note").build().unwrap();
        assert_eq!(names(&collect(&store, &query)), vec!["n"]);
    }
}

#[test]
fn test_ancestor_filter_unsupported() {
    for store in stores() {
        seed(&store);
        let query = Query::key_query_builder()
            .kind("Task")
            .filter(PropertyFilter::has_ancestor(task_key(&store, "t0")))
            .build()
            .unwrap();
        let err = store.run(&query).unwrap_err();
        assert!(err.is_invalid_request(), "{}", store.backend_name());
    }
}

// =============================================================================
// Projection and distinct
// =============================================================================

#[test]
fn test_projection_returns_only_named_properties() {
    for store in stores() {
        seed(&store);
        let query = Query::projection_entity_query_builder()
            .kind("Task")
            .projection(["num"])
            .order_by(OrderBy::asc("num"))
            .build()
            .unwrap();
        let rows = collect(&store, &query);
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].key().name(), Some("t0"));
        let props: Vec<&String> = rows[4].names().collect();
        assert_eq!(props, vec!["num"], "{}", store.backend_name());
        assert_eq!(rows[4].get_long("num").unwrap(), 4);
    }
}

#[test]
fn test_distinct_keeps_first_per_group() {
    for store in stores() {
        seed(&store);
        let query = Query::projection_entity_query_builder()
            .kind("Task")
            .projection(["category", "priority"])
            .distinct_on(["category"])
            .order_by(OrderBy::asc("priority"))
            .build()
            .unwrap();
        let mut picked: Vec<(String, i64)> = collect(&store, &query)
            .iter()
            .map(|row| {
                (
                    row.get_string("category").unwrap().to_string(),
                    row.get_long("priority").unwrap(),
                )
            })
            .collect();
        picked.sort();
        // lowest priority per category: t4 (even, 6) and t3 (odd, 7)
        assert_eq!(
            picked,
            vec![("even".to_string(), 6), ("odd".to_string(), 7)],
            "{}",
            store.backend_name()
        );
    }
}

#[test]
fn test_distinct_without_projection_rejected() {
    let err = Query::projection_entity_query_builder()
        .kind("Task")
        .distinct_on(["category"])
        .order_by(OrderBy::asc("priority"))
        .build()
        .unwrap_err();
    assert!(err.is_invalid_request());
}

#[test]
fn test_distinct_row_shape_matches_across_backends() {
    let query = Query::projection_entity_query_builder()
        .kind("Task")
        .projection(["category", "num"])
        .distinct_on(["category"])
        .order_by(OrderBy::asc("priority"))
        .build()
        .unwrap();
    let mut shapes = Vec::new();
    for store in stores() {
        seed(&store);
        let rows = collect(&store, &query);
        let shape: Vec<Vec<String>> = rows
            .iter()
            .map(|row| row.names().cloned().collect())
            .collect();
        assert_eq!(shape.len(), 2, "{}", store.backend_name());
        shapes.push(shape);
    }
    assert_eq!(shapes[0], shapes[1]);
    assert_eq!(shapes[0][0], vec!["category", "num"]);
}
