use nitrite_core::collection::{Filter, NitriteId};
use nitrite_core::common::Value;
use nitrite_core::doc;
use nitrite_core::errors::ErrorKind;
use nitrite_core::index::IndexKind;
use nitrite_int_test::test_util::{cleanup, create_small_batch_context, create_test_context, insert_people, run_test};
use rand::Rng;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_multi_threaded_insert() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            let num_threads = 5;
            let inserts_per_thread = 100;
            let barrier = Arc::new(Barrier::new(num_threads));

            let handles: Vec<_> = (0..num_threads)
                .map(|thread_id| {
                    let collection = collection.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        (0..inserts_per_thread)
                            .map(|i| {
                                collection
                                    .insert(doc! { thread_id: (thread_id as i32), sequence: i })
                                    .unwrap()
                                    .first()
                                    .unwrap()
                            })
                            .collect::<Vec<NitriteId>>()
                    })
                })
                .collect();

            let mut ids = BTreeSet::new();
            for handle in handles {
                ids.extend(handle.join().unwrap());
            }
            assert_eq!(ids.len(), num_threads * inserts_per_thread);
            assert_eq!(collection.size()? as usize, num_threads * inserts_per_thread);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_unique_index_under_contention() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.create_index(vec!["slot"], IndexKind::Unique)?;
            let num_threads = 8;
            let barrier = Arc::new(Barrier::new(num_threads));

            // every thread races for the same ten slots
            let handles: Vec<_> = (0..num_threads)
                .map(|_| {
                    let collection = collection.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        let mut won = 0;
                        for slot in 0..10 {
                            match collection.insert(doc! { slot: slot }) {
                                Ok(_) => won += 1,
                                Err(e) => assert_eq!(e.kind(), &ErrorKind::IndexingError),
                            }
                        }
                        won
                    })
                })
                .collect();

            let won: i32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
            assert_eq!(won, 10);
            assert_eq!(collection.size()?, 10);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_readers_never_see_half_applied_writes() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.create_index(vec!["key"], IndexKind::NonUnique)?;
            let done = Arc::new(AtomicBool::new(false));

            let writer = {
                let collection = collection.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    let mut ids = Vec::new();
                    for _ in 0..2_000 {
                        if ids.is_empty() || rng.gen_bool(0.6) {
                            let key = rng.gen_range(0..20);
                            ids.push(collection.insert(doc! { key: key }).unwrap().first().unwrap());
                        } else {
                            let id = ids.swap_remove(rng.gen_range(0..ids.len()));
                            collection.remove_by_id(id).unwrap();
                        }
                    }
                    done.store(true, Ordering::SeqCst);
                })
            };

            let readers: Vec<_> = (0..3)
                .map(|r| {
                    let collection = collection.clone();
                    let done = done.clone();
                    thread::spawn(move || {
                        let key = Value::from(r as i32);
                        while !done.load(Ordering::SeqCst) {
                            // each call is atomic: every indexed id resolves to a live document
                            for id in collection.lookup(vec!["key"], &key).unwrap() {
                                if let Some(document) = collection.get_by_id(id).unwrap() {
                                    assert_eq!(document.get("key").unwrap(), key);
                                }
                            }
                            let via_index = collection.find(Filter::eq("key", r as i32)).unwrap();
                            for document in via_index {
                                assert_eq!(document.get("key").unwrap(), key);
                            }
                        }
                    })
                })
                .collect();

            writer.join().unwrap();
            for reader in readers {
                reader.join().unwrap();
            }

            for key in 0..20 {
                let indexed: BTreeSet<NitriteId> = collection
                    .lookup(vec!["key"], &Value::from(key))?
                    .into_iter()
                    .collect();
                let scanned: BTreeSet<NitriteId> = collection
                    .find(Filter::predicate(move |doc| doc.get("key").ok() == Some(Value::from(key))))?
                    .filter_map(|doc| doc.existing_id())
                    .collect();
                assert_eq!(indexed, scanned);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_index_build_with_concurrent_writers() {
    run_test(
        create_small_batch_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            insert_people(&collection, 1_000)?;
            let existing: Vec<NitriteId> = collection
                .find(Filter::all())?
                .filter_map(|doc| doc.existing_id())
                .collect();

            let num_writers = 4;
            let barrier = Arc::new(Barrier::new(num_writers + 1));
            let writers: Vec<_> = (0..num_writers)
                .map(|w| {
                    let collection = collection.clone();
                    let barrier = barrier.clone();
                    let existing = existing.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        let mut rng = rand::thread_rng();
                        for i in 0..200 {
                            match i % 3 {
                                0 => {
                                    collection
                                        .insert(doc! { first_name: (format!("w{}_{}", w, i)), age: 99 })
                                        .unwrap();
                                }
                                1 => {
                                    let id = existing[rng.gen_range(0..existing.len())];
                                    collection.update_by_id(id, &doc! { age: 98 }, false).unwrap();
                                }
                                _ => {
                                    let id = existing[rng.gen_range(0..existing.len())];
                                    collection.remove_by_id(id).unwrap();
                                }
                            }
                        }
                    })
                })
                .collect();

            barrier.wait();
            collection.create_index(vec!["age"], IndexKind::NonUnique)?;
            for writer in writers {
                writer.join().unwrap();
            }

            assert!(collection.is_indexed_with(vec!["age"], IndexKind::NonUnique)?);
            for age in 20..100 {
                let indexed: BTreeSet<NitriteId> = collection
                    .lookup(vec!["age"], &Value::from(age))?
                    .into_iter()
                    .collect();
                let scanned: BTreeSet<NitriteId> = collection
                    .find(Filter::predicate(move |doc| doc.get("age").ok() == Some(Value::from(age))))?
                    .filter_map(|doc| doc.existing_id())
                    .collect();
                assert_eq!(indexed, scanned, "age {}", age);
            }
            assert_eq!(collection.lookup(vec!["age"], &Value::from(99))?.len(), 268);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_second_build_of_same_index_is_rejected() {
    run_test(
        create_small_batch_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            insert_people(&collection, 2_000)?;

            let builder = {
                let collection = collection.clone();
                thread::spawn(move || collection.create_index(vec!["email"], IndexKind::Unique))
            };

            // whichever call loses the race is refused rather than run twice
            let second = collection.create_index(vec!["email"], IndexKind::Unique);
            let first = builder.join().unwrap();
            assert!(first.is_ok() != second.is_ok());
            let err = first.err().or(second.err()).unwrap();
            assert_eq!(err.kind(), &ErrorKind::IndexingError);
            assert!(collection.is_indexed_with(vec!["email"], IndexKind::Unique)?);
            Ok(())
        },
        cleanup,
    )
}
