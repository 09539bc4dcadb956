//! Creation, scheduling order, join semantics, and teardown.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use weft::sync::{CondVar, Mutex};
use weft::{RuntimeConfig, RuntimeError, ThreadState};

#[test]
fn create_and_join_returns_the_entry_result() {
    common::with_runtime(common::small_config(), || {
        let worker = weft::create(|| 40 + 2).unwrap();
        assert_eq!(weft::join(worker).unwrap(), 42);
        assert_eq!(weft::state_of(worker).unwrap(), ThreadState::Finished);
    });
}

#[test]
fn threads_run_in_round_robin_creation_order() {
    common::with_runtime(common::small_config(), || {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut workers = Vec::new();
        for tag in 1..=3usize {
            let log = Rc::clone(&log);
            workers.push(
                weft::create(move || {
                    log.borrow_mut().push(tag);
                    tag
                })
                .unwrap(),
            );
        }
        // One yield drains the whole ring: each worker exits into the next.
        assert!(weft::yield_now());
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
        for (index, worker) in workers.into_iter().enumerate() {
            assert_eq!(weft::join(worker).unwrap(), index + 1);
        }
    });
}

#[test]
fn yield_with_no_runnable_peer_keeps_the_caller() {
    common::with_runtime(common::small_config(), || {
        assert!(!weft::yield_now());
        let worker = weft::create(|| 0).unwrap();
        assert_eq!(weft::join(worker).unwrap(), 0);
        // The only other thread has finished; nothing to switch to again.
        assert!(!weft::yield_now());
    });
}

#[test]
fn finished_slots_are_never_reused() {
    common::with_runtime(common::small_config(), || {
        let first = weft::create(|| 1).unwrap();
        weft::join(first).unwrap();
        let second = weft::create(|| 2).unwrap();
        assert_ne!(first, second);
        assert_eq!(weft::state_of(first).unwrap(), ThreadState::Finished);
        weft::join(second).unwrap();
    });
}

#[test]
fn early_exit_carries_its_result_to_the_joiner() {
    common::with_runtime(common::small_config(), || {
        let worker = weft::create(|| weft::exit(123)).unwrap();
        assert_eq!(weft::join(worker).unwrap(), 123);
    });
}

#[test]
fn join_rejects_self_and_unknown_targets() {
    common::with_runtime(common::small_config(), || {
        assert!(matches!(
            weft::join(weft::current()),
            Err(RuntimeError::JoinSelf)
        ));
        // In range but never created.
        assert!(matches!(weft::join(5), Err(RuntimeError::InvalidThread(5))));
        // Out of range entirely.
        assert!(matches!(
            weft::join(99),
            Err(RuntimeError::InvalidThread(99))
        ));
    });
}

#[test]
fn a_live_target_admits_only_one_joiner() {
    common::with_runtime(common::small_config(), || {
        let mutex = Rc::new(Mutex::new());
        let cond = Rc::new(CondVar::new());
        let released = Rc::new(Cell::new(false));

        let target = {
            let (mutex, cond, released) =
                (Rc::clone(&mutex), Rc::clone(&cond), Rc::clone(&released));
            weft::create(move || {
                mutex.lock();
                while !released.get() {
                    cond.wait(&mutex);
                }
                mutex.unlock();
                9
            })
            .unwrap()
        };
        let watcher = weft::create(move || weft::join(target).unwrap()).unwrap();

        // Let the target park and the watcher record itself as joiner.
        assert!(weft::yield_now());
        assert_eq!(weft::state_of(target).unwrap(), ThreadState::Blocked);
        assert!(matches!(
            weft::join(target),
            Err(RuntimeError::AlreadyJoined(id)) if id == target
        ));

        mutex.lock();
        released.set(true);
        mutex.unlock();
        cond.signal();
        assert_eq!(weft::join(watcher).unwrap(), 9);
    });
}

#[test]
fn joining_a_finished_thread_returns_immediately() {
    common::with_runtime(common::small_config(), || {
        let worker = weft::create(|| 7).unwrap();
        assert!(weft::yield_now());
        assert_eq!(weft::state_of(worker).unwrap(), ThreadState::Finished);
        // No switch needed; the stored result is read straight out.
        assert_eq!(weft::join(worker).unwrap(), 7);
    });
}

#[test]
fn table_capacity_is_a_hard_limit() {
    let config = RuntimeConfig {
        max_threads: 3,
        ..common::small_config()
    };
    common::with_runtime(config, || {
        let a = weft::create(|| 0).unwrap();
        let b = weft::create(|| 0).unwrap();
        assert!(matches!(
            weft::create(|| 0),
            Err(RuntimeError::CapacityExceeded)
        ));
        weft::join(a).unwrap();
        weft::join(b).unwrap();
        // Finished slots do not come back.
        assert!(matches!(
            weft::create(|| 0),
            Err(RuntimeError::CapacityExceeded)
        ));
    });
}

#[test]
fn lifecycle_is_observable_through_state_of() {
    common::with_runtime(common::small_config(), || {
        assert_eq!(weft::state_of(weft::current()).unwrap(), ThreadState::Active);
        assert_eq!(weft::state_of(3).unwrap(), ThreadState::Invalid);
        let worker = weft::create(|| 0).unwrap();
        assert_eq!(weft::state_of(worker).unwrap(), ThreadState::Active);
        weft::join(worker).unwrap();
        assert_eq!(weft::state_of(worker).unwrap(), ThreadState::Finished);
        assert!(matches!(
            weft::state_of(99),
            Err(RuntimeError::InvalidThread(99))
        ));
    });
}

#[test]
fn init_and_shutdown_enforce_lifecycle_order() {
    let _gate = common::runtime_lock();
    assert!(matches!(
        weft::create(|| 0),
        Err(RuntimeError::NotInitialized)
    ));
    assert!(matches!(weft::shutdown(), Err(RuntimeError::NotInitialized)));

    weft::init(common::small_config()).unwrap();
    assert!(matches!(
        weft::init(common::small_config()),
        Err(RuntimeError::AlreadyInitialized)
    ));

    let worker = weft::create(|| 0).unwrap();
    assert!(matches!(
        weft::shutdown(),
        Err(RuntimeError::ThreadsStillLive)
    ));
    weft::join(worker).unwrap();
    weft::shutdown().unwrap();

    // A fresh init after shutdown starts from a clean table.
    weft::init(common::small_config()).unwrap();
    let worker = weft::create(|| 11).unwrap();
    assert_eq!(weft::join(worker).unwrap(), 11);
    weft::shutdown().unwrap();
}

#[test]
fn init_rejects_degenerate_configurations() {
    let _gate = common::runtime_lock();
    let config = RuntimeConfig {
        max_threads: 1,
        ..RuntimeConfig::default()
    };
    assert!(matches!(
        weft::init(config),
        Err(RuntimeError::InvalidConfig(_))
    ));
}
