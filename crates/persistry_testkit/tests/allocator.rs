//! Identifier allocation against writable stores and replicas.

use persistry_core::PersistResult;
use persistry_testkit::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[test]
fn sequence_ids_increase_within_a_transaction() {
    let env = TestEnv::new();

    let (first, second) = env
        .tm
        .transact(|txn| {
            let first = txn.allocate_id()?;
            let second = txn.allocate_id()?;
            Ok((first, second))
        })
        .unwrap();
    assert!(first >= 1);
    assert_eq!(second, first + 1);
}

#[test]
fn concurrent_allocations_never_collide() {
    let env = Arc::new(TestEnv::new());
    let threads = 8;
    let per_thread = 125;

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let env = Arc::clone(&env);
            thread::spawn(move || {
                env.tm
                    .transact(|txn| {
                        let mut ids = Vec::with_capacity(per_thread);
                        for _ in 0..per_thread {
                            ids.push(txn.allocate_id()?);
                        }
                        Ok(ids)
                    })
                    .unwrap()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(seen.insert(id), "id {id} allocated twice");
        }
    }
    assert_eq!(seen.len(), threads * per_thread);
}

#[test]
fn read_only_coordinator_allocates_local_ids() {
    let env = TestEnv::with_config(
        persistry_core::CoordinatorConfig::new().read_only(true),
    );

    let (first, second) = env
        .tm
        .transact(|txn| Ok((txn.allocate_id()?, txn.allocate_id()?)))
        .unwrap();
    assert!(first >= 1);
    assert!(second > first);
}

#[test]
fn replica_allocations_are_local_but_unique() {
    let env = TestEnv::new();
    let replica = env.replica();

    let ids: PersistResult<Vec<i64>> = replica.tm.transact(|txn| {
        let mut ids = Vec::new();
        for _ in 0..100 {
            ids.push(txn.allocate_id()?);
        }
        Ok(ids)
    });
    let ids = ids.unwrap();

    assert!(ids.iter().all(|id| *id >= 1));
    assert!(ids.windows(2).all(|pair| pair[1] > pair[0]));

    // Replica allocation must not advance the shared store sequence.
    let next = env.tm.transact(|txn| txn.allocate_id()).unwrap();
    assert_eq!(next, 1);
}
