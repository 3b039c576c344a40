use nitrite_core::collection::{Filter, NitriteId};
use nitrite_core::common::Value;
use nitrite_core::doc;
use nitrite_core::errors::ErrorKind;
use nitrite_core::index::IndexKind;
use nitrite_core::transaction::TransactionState;
use nitrite_int_test::test_util::{cleanup, create_test_context, run_test};
use std::sync::{Arc, Barrier};
use std::thread;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_uncommitted_insert_is_invisible() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            let txn = collection.begin_transaction()?;
            let id = txn.insert(doc! { name: "pending" })?;

            assert!(collection.get_by_id(id)?.is_none());
            assert_eq!(txn.get_by_id(id)?.unwrap().get("name")?, Value::from("pending"));

            txn.commit()?;
            assert_eq!(collection.get_by_id(id)?.unwrap().get("name")?, Value::from("pending"));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_rollback_of_many_inserts() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.create_index(vec!["n"], IndexKind::Unique)?;
            collection.insert(doc! { n: (-1) })?;

            let txn = collection.begin_transaction()?;
            for n in 0..100 {
                txn.insert(doc! { n: n })?;
            }
            assert_eq!(txn.size()?, 101);
            txn.rollback()?;

            assert_eq!(collection.size()?, 1);
            assert!(collection.lookup(vec!["n"], &Value::from(5))?.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_commit_of_many_inserts_is_indexed() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.create_index(vec!["n"], IndexKind::Unique)?;

            let txn = collection.begin_transaction()?;
            let ids: Vec<NitriteId> = (0..100)
                .map(|n| txn.insert(doc! { n: n }))
                .collect::<Result<_, _>>()?;
            txn.commit()?;

            assert_eq!(collection.size()?, 100);
            for (n, id) in ids.iter().enumerate() {
                assert_eq!(collection.lookup(vec!["n"], &Value::from(n as i32))?, vec![*id]);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failed_commit_is_all_or_nothing() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.create_index(vec!["code"], IndexKind::Unique)?;
            let victim = collection.insert(doc! { code: "v" })?.first().unwrap();

            let txn = collection.begin_transaction()?;
            txn.update_by_id(victim, &doc! { code: "v2" })?;
            for n in 0..10 {
                txn.insert(doc! { code: (format!("c{}", n)) })?;
            }
            txn.insert(doc! { code: "taken" })?;

            collection.insert(doc! { code: "taken" })?;

            let err = txn.commit().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexingError);
            assert_eq!(err.cause().unwrap().kind(), &ErrorKind::IndexingError);
            assert_eq!(txn.state(), TransactionState::Failed);

            assert_eq!(collection.size()?, 2);
            let stored = collection.get_by_id(victim)?.unwrap();
            assert_eq!(stored.get("code")?, Value::from("v"));
            assert_eq!(collection.lookup(vec!["code"], &Value::from("v"))?, vec![victim]);
            assert!(collection.lookup(vec!["code"], &Value::from("v2"))?.is_empty());
            assert!(collection.lookup(vec!["code"], &Value::from("c3"))?.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_commit_fails_when_target_removed_outside() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.create_index(vec!["n"], IndexKind::NonUnique)?;
            let target = collection.insert(doc! { n: 1 })?.first().unwrap();

            let txn = collection.begin_transaction()?;
            let pending = txn.insert(doc! { n: 2 })?;
            assert_eq!(txn.update_by_id(target, &doc! { n: 10 })?.affected_count(), 1);

            collection.remove_by_id(target)?;

            let err = txn.commit().unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidOperation);
            assert_eq!(txn.state(), TransactionState::Failed);

            assert_eq!(collection.size()?, 0);
            assert!(collection.get_by_id(pending)?.is_none());
            assert!(collection.lookup(vec!["n"], &Value::from(2))?.is_empty());
            assert!(collection.lookup(vec!["n"], &Value::from(10))?.is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_remove_commit_fails_when_target_removed_outside() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            let kept = collection.insert(doc! { n: 1 })?.first().unwrap();
            let target = collection.insert(doc! { n: 2 })?.first().unwrap();

            let txn = collection.begin_transaction()?;
            txn.remove_by_id(kept)?;
            txn.remove_by_id(target)?;

            collection.remove_by_id(target)?;

            assert!(txn.commit().is_err());
            assert_eq!(txn.state(), TransactionState::Failed);
            assert!(collection.get_by_id(kept)?.is_some());
            assert_eq!(collection.size()?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_transactions_are_isolated_from_each_other() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            let first = collection.begin_transaction()?;
            let second = collection.begin_transaction()?;
            assert_ne!(first.id(), second.id());

            let id = first.insert(doc! { owner: "first" })?;
            assert!(second.get_by_id(id)?.is_none());
            assert_eq!(second.find(Filter::eq("owner", "first"))?.size(), 0);

            first.commit()?;
            assert!(second.get_by_id(id)?.is_some());
            second.rollback()?;
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_concurrent_commits() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            collection.create_index(vec!["worker"], IndexKind::NonUnique)?;
            let workers = 4;
            let barrier = Arc::new(Barrier::new(workers));

            let handles: Vec<_> = (0..workers)
                .map(|w| {
                    let collection = collection.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        for _ in 0..10 {
                            let txn = collection.begin_transaction().unwrap();
                            for i in 0..5 {
                                txn.insert(doc! { worker: (w as i32), i: i }).unwrap();
                            }
                            txn.commit().unwrap();
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(collection.size()?, 200);
            for w in 0..workers as i32 {
                assert_eq!(collection.lookup(vec!["worker"], &Value::from(w))?.len(), 50);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_dropped_transaction_rolls_back() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.db().collection(ctx.name())?;
            {
                let txn = collection.begin_transaction()?;
                txn.insert(doc! { name: "forgotten" })?;
            }
            assert_eq!(collection.size()?, 0);
            Ok(())
        },
        cleanup,
    )
}
