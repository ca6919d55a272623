use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pathspace::config::WaitConfig;
use pathspace::task::TaskPool;
use pathspace::ExecutionCategory;
use pathspace::InOptions;
use pathspace::OutOptions;
use pathspace::PathSpace;
use pathspace::Space;
use pathspace::SpaceError;
use pathspace::SpaceExt;
use tracing_test::traced_test;

use crate::common::space;
use crate::common::wait_for;
use crate::common::PATIENCE;

#[test]
fn immediate_task_result_becomes_a_value() {
    let space = space();
    let ret = space.insert_task("/report", || {
        thread::sleep(Duration::from_millis(20));
        "ready".to_string()
    });
    assert_eq!(ret.tasks_inserted, 1);

    assert_eq!(space.read_block::<String>("/report", PATIENCE), Ok("ready".to_string()));
    assert_eq!(space.take::<String>("/report"), Ok("ready".to_string()));
}

#[test]
fn lazy_task_waits_for_its_first_reader() {
    let space = space();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    space.insert_task_with(
        "/expensive",
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            99u64
        },
        InOptions::default().lazy(),
    );

    thread::sleep(Duration::from_millis(50));
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    let peek = space.read_with::<u64>(
        "/expensive",
        OutOptions::read().execution(ExecutionCategory::Lazy),
    );
    assert!(matches!(peek, Err(SpaceError::NoObjectFound { .. })));
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    assert_eq!(space.read_block::<u64>("/expensive", PATIENCE), Ok(99));
    assert_eq!(space.read::<u64>("/expensive"), Ok(99));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
#[traced_test]
fn panicking_task_does_not_stall_the_queue() {
    let space = space();
    space.insert_task("/jobs", || -> i32 { panic!("exploded") });
    space.insert("/jobs", 2i32);

    wait_for("task failure", || {
        matches!(space.read::<i32>("/jobs"), Err(SpaceError::TaskFailed { .. }))
    });
    match space.take::<i32>("/jobs") {
        Err(SpaceError::TaskFailed { message, .. }) => assert!(message.contains("exploded")),
        other => panic!("expected a failed task, got {other:?}"),
    }
    assert_eq!(space.take::<i32>("/jobs"), Ok(2));
}

#[test]
fn result_for_removed_node_is_dropped() {
    let space = space();
    space.insert_task("/scratch/result", || {
        thread::sleep(Duration::from_millis(100));
        1i32
    });
    assert_eq!(space.remove("/scratch"), Ok(1));

    thread::sleep(Duration::from_millis(200));
    assert!(matches!(
        space.read::<i32>("/scratch/result"),
        Err(SpaceError::NoSuchPath { .. })
    ));
}

#[test]
fn shared_pool_serves_several_spaces() {
    let pool = Arc::new(TaskPool::with_workers(2).unwrap());
    let first = PathSpace::with_pool(Arc::clone(&pool), &WaitConfig::default());
    let second = PathSpace::with_pool(Arc::clone(&pool), &WaitConfig::default());

    first.insert_task("/x", || 1i32);
    second.insert_task("/x", || 2i32);
    assert_eq!(first.read_block::<i32>("/x", PATIENCE), Ok(1));
    assert_eq!(second.read_block::<i32>("/x", PATIENCE), Ok(2));

    first.shutdown();
    assert!(!pool.is_shutdown());
    second.insert_task("/y", || 3i32);
    assert_eq!(second.read_block::<i32>("/y", PATIENCE), Ok(3));
    wait_for("pool counters", || pool.stats().executed == 3);
}

#[test]
fn lazy_tasks_in_nested_spaces_start_on_read() {
    let outer = space();
    let inner = PathSpace::new().unwrap();
    outer.mount("/plugins/geo", inner.clone());

    inner.insert_task_with("/lookup", || "paris".to_string(), InOptions::default().lazy());
    assert_eq!(
        outer.read_block::<String>("/plugins/geo/lookup", PATIENCE),
        Ok("paris".to_string())
    );
}
