use nitrite_core::collection::{Filter, NitriteCollection, NitriteId};
use nitrite_core::common::Value;
use nitrite_core::doc;
use nitrite_core::errors::{ErrorKind, NitriteResult};
use nitrite_core::index::{IndexKind, IndexState};
use nitrite_int_test::test_util::{cleanup, create_small_batch_context, create_test_context, insert_people, run_test};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};

#[ctor::ctor]
fn init() {
    colog::init();
}

/// Every stored document is found under its value and nothing else is.
fn assert_index_consistent(collection: &NitriteCollection, field: &str, domain: &[i32]) -> NitriteResult<()> {
    let mut expected: BTreeMap<i32, BTreeSet<NitriteId>> = BTreeMap::new();
    for document in collection.find(Filter::all())? {
        if let Value::I32(value) = document.get(field)? {
            expected.entry(value).or_default().insert(document.existing_id().unwrap());
        }
    }

    for value in domain {
        let found: BTreeSet<NitriteId> = collection
            .lookup(vec![field], &Value::from(*value))?
            .into_iter()
            .collect();
        assert_eq!(found, expected.remove(value).unwrap_or_default(), "value {}", value);
    }
    Ok(())
}

#[test]
fn test_index_stays_consistent_under_random_writes() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.create_index(vec!["bucket"], IndexKind::NonUnique)?;
            let domain: Vec<i32> = (0..10).collect();
            let mut rng = StdRng::seed_from_u64(7);
            let mut ids = Vec::new();

            for _ in 0..500 {
                match rng.gen_range(0..4) {
                    0 | 1 => {
                        let bucket = rng.gen_range(0..10);
                        ids.push(collection.insert(doc! { bucket: bucket })?.first().unwrap());
                    }
                    2 if !ids.is_empty() => {
                        let id = ids[rng.gen_range(0..ids.len())];
                        let bucket = rng.gen_range(0..10);
                        collection.update_by_id(id, &doc! { bucket: bucket }, false)?;
                    }
                    3 if !ids.is_empty() => {
                        let id = ids.swap_remove(rng.gen_range(0..ids.len()));
                        collection.remove_by_id(id)?;
                    }
                    _ => {}
                }
            }

            assert_index_consistent(&collection, "bucket", &domain)
        },
        cleanup,
    )
}

#[test]
fn test_index_built_over_existing_data() {
    run_test(
        create_small_batch_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            insert_people(&collection, 300)?;

            collection.create_index(vec!["age"], IndexKind::NonUnique)?;
            assert!(collection.is_indexed_with(vec!["age"], IndexKind::NonUnique)?);
            assert!(!collection.is_indexed_with(vec!["age"], IndexKind::Unique)?);
            assert!(!collection.is_indexing(vec!["age"])?);

            let descriptor = collection.list_indexes()?.pop().unwrap();
            assert_eq!(descriptor.state(), IndexState::Active);

            let domain: Vec<i32> = (20..70).collect();
            assert_index_consistent(&collection, "age", &domain)?;
            assert_eq!(collection.lookup(vec!["age"], &Value::from(20))?.len(), 6);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unique_violation_found_mid_build() {
    run_test(
        create_small_batch_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            insert_people(&collection, 100)?;
            // duplicates land far apart, several batches into the build
            collection.insert(doc! { email: "person_3@example.org" })?;

            let err = collection.create_index(vec!["email"], IndexKind::Unique).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexingError);
            assert!(!collection.has_index(vec!["email"])?);
            assert!(collection
                .lookup(vec!["email"], &Value::from("person_0@example.org"))
                .is_err());

            // the failed build left nothing behind, so a retry after fixing the data works
            collection.remove(Filter::eq("email", "person_3@example.org"), true)?;
            collection.create_index(vec!["email"], IndexKind::Unique)?;
            assert_eq!(collection.lookup(vec!["email"], &Value::from("person_7@example.org"))?.len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_compound_index() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.create_index(vec!["first", "last"], IndexKind::Unique)?;
            collection.insert(doc! { first: "Ann", last: "Lee" })?;
            collection.insert(doc! { first: "Ann", last: "Kim" })?;

            let err = collection.insert(doc! { first: "Ann", last: "Lee" }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexingError);

            let key = Value::Array(vec![Value::from("Ann"), Value::from("Kim")]);
            assert_eq!(collection.lookup(vec!["first", "last"], &key)?.len(), 1);
            // field order matters
            assert!(!collection.has_index(vec!["last", "first"])?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_array_values_are_indexed_per_element() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.create_index(vec!["tags"], IndexKind::NonUnique)?;
            let id = collection
                .insert(doc! { tags: ["red", "green"] })?
                .first()
                .unwrap();

            assert_eq!(collection.lookup(vec!["tags"], &Value::from("green"))?, vec![id]);
            assert_eq!(collection.find(Filter::eq("tags", "red"))?.size(), 1);

            collection.update_by_id(id, &doc! { tags: ["blue"] }, false)?;
            assert!(collection.lookup(vec!["tags"], &Value::from("red"))?.is_empty());
            assert_eq!(collection.lookup(vec!["tags"], &Value::from("blue"))?, vec![id]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_full_text_index() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.create_index(vec!["body"], IndexKind::FullText)?;
            let fox = collection
                .insert(doc! { body: "The quick brown fox jumps over the lazy dog" })?
                .first()
                .unwrap();
            collection.insert(doc! { body: "Lorem ipsum dolor sit amet" })?;

            assert_eq!(collection.lookup(vec!["body"], &Value::from("jump"))?, vec![fox]);
            assert_eq!(collection.find(Filter::text("body", "LOREM"))?.size(), 1);
            assert_eq!(collection.find(Filter::text("body", "the"))?.size(), 0);

            let err = collection.insert(doc! { body: 42 }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexingError);
            assert_eq!(collection.size()?, 2);

            collection.remove_by_id(fox)?;
            assert!(collection.lookup(vec!["body"], &Value::from("fox"))?.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_rebuild_index() {
    run_test(
        create_small_batch_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            insert_people(&collection, 50)?;
            collection.create_index(vec!["age"], IndexKind::NonUnique)?;
            collection.rebuild_index(vec!["age"])?;

            assert!(collection.is_indexed_with(vec!["age"], IndexKind::NonUnique)?);
            let domain: Vec<i32> = (20..70).collect();
            assert_index_consistent(&collection, "age", &domain)?;

            let err = collection.rebuild_index(vec!["missing"]).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexingError);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_indexes_survive_reopening_the_collection() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let collection = db.collection(ctx.name())?;
            collection.create_index(vec!["email"], IndexKind::Unique)?;
            collection.insert(doc! { email: "a@x.org" })?;
            collection.close()?;

            let reopened = db.collection(ctx.name())?;
            assert!(reopened.is_indexed_with(vec!["email"], IndexKind::Unique)?);
            let err = reopened.insert(doc! { email: "a@x.org" }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexingError);
            Ok(())
        },
        cleanup,
    )
}
