use std::thread;
use std::time::Duration;
use std::time::Instant;

use pathspace::OutOptions;
use pathspace::Space;
use pathspace::SpaceError;
use pathspace::SpaceExt;
use tracing_test::traced_test;

use crate::common::space;
use crate::common::PATIENCE;

#[test]
fn take_wakes_on_insert_from_another_thread() {
    let space = space();
    let writer = space.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        writer.insert("/mailbox/a", 42i32);
    });

    let started = Instant::now();
    assert_eq!(space.take_block::<i32>("/mailbox/a", PATIENCE), Ok(42));
    assert!(started.elapsed() < PATIENCE);
    handle.join().unwrap();
}

#[test]
#[traced_test]
fn timeout_is_reported_with_the_budget() {
    let space = space();
    let budget = Duration::from_millis(50);

    let started = Instant::now();
    let result = space.read_block::<i32>("/never", budget);
    assert!(started.elapsed() >= budget);
    assert_eq!(
        result,
        Err(SpaceError::Timeout {
            path: "/never".to_string(),
            duration: budget,
        })
    );
}

#[test]
fn wrong_type_fails_without_waiting() {
    let space = space();
    space.insert("/typed", 1u8);

    let started = Instant::now();
    let result = space.read_block::<String>("/typed", PATIENCE);
    assert!(matches!(result, Err(SpaceError::InvalidType { .. })));
    assert!(started.elapsed() < PATIENCE);
}

#[test]
fn pattern_waiter_wakes_on_matching_insert() {
    let space = space();
    let writer = space.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        writer.insert("/sensors/kitchen", 21.5f64);
    });

    assert_eq!(space.read_block::<f64>("/sensors/*", PATIENCE), Ok(21.5));
    handle.join().unwrap();
}

#[test]
fn pattern_waiter_wakes_on_insert_forwarded_into_mount() {
    let outer = space();
    let inner = space();
    outer.mount("/m", inner);
    let writer = outer.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        writer.insert("/m/x", 7i32);
    });

    let started = Instant::now();
    assert_eq!(outer.read_block::<i32>("/m/*", PATIENCE), Ok(7));
    assert!(started.elapsed() < PATIENCE / 2);
    handle.join().unwrap();
}

#[test]
fn forever_pattern_waiter_wakes_on_direct_insert_into_mounted_space() {
    let outer = space();
    let inner = space();
    outer.mount("/m", inner.clone());
    let waiter = outer.clone();
    let handle = thread::spawn(move || {
        waiter.read_with::<i32>("/m/*", OutOptions::read().block_forever())
    });

    thread::sleep(Duration::from_millis(100));
    inner.insert("/x", 8i32);

    let deadline = Instant::now() + PATIENCE / 2;
    while !handle.is_finished() {
        assert!(Instant::now() < deadline, "waiter never woke");
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(handle.join().unwrap(), Ok(8));
}

#[test]
fn pattern_waiter_wakes_on_task_result_in_mounted_space() {
    let outer = space();
    let inner = space();
    outer.mount("/m", inner.clone());
    inner.insert_task("/job", || {
        thread::sleep(Duration::from_millis(100));
        10i32
    });

    let started = Instant::now();
    assert_eq!(outer.read_block::<i32>("/m/*", PATIENCE), Ok(10));
    assert!(started.elapsed() < PATIENCE / 2);
}

#[test]
fn forever_block_ends_on_shutdown() {
    let space = space();
    let waiter = space.clone();
    let handle = thread::spawn(move || {
        waiter.read_with::<i32>("/never", OutOptions::read().block_forever())
    });

    thread::sleep(Duration::from_millis(50));
    space.shutdown();

    let result = handle.join().unwrap();
    assert!(matches!(result, Err(SpaceError::NoSuchPath { .. })));
    assert!(matches!(
        space.insert("/late", 1i32).errors.as_slice(),
        [SpaceError::InvalidPermissions(_)]
    ));
}

#[test]
fn explicit_notify_rechecks_waiters() {
    let space = space();
    let waiter = space.clone();
    let handle = thread::spawn(move || waiter.read_block::<i32>("/manual", PATIENCE));

    thread::sleep(Duration::from_millis(20));
    space.insert("/manual", 5i32);
    space.notify("/manual");
    assert_eq!(handle.join().unwrap(), Ok(5));
}
