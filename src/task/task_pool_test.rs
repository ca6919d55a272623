use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::bounded;

use super::*;
use crate::config::TaskPoolConfig;
use crate::Error;
use crate::TaskError;

fn wait_for(
    deadline: Duration,
    mut condition: impl FnMut() -> bool,
) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn executes_strong_tasks() {
    let pool = TaskPool::with_workers(2).unwrap();
    let (tx, rx) = bounded(1);

    let task = Task::new("/strong", move || {
        tx.send(42).unwrap();
    });
    pool.submit(task.into()).unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    assert!(wait_for(Duration::from_secs(5), || pool.stats().executed == 1));
}

#[test]
fn weak_task_runs_while_owner_is_alive() {
    let pool = TaskPool::with_workers(1).unwrap();
    let (tx, rx) = bounded(1);

    let task = Task::new("/weak", move || {
        tx.send(()).unwrap();
    });
    pool.submit_weak(&task).unwrap();

    assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    drop(task);
}

#[test]
fn dead_weak_task_is_discarded() {
    let pool = TaskPool::with_workers(1).unwrap();
    let (gate_tx, gate_rx) = bounded::<()>(0);
    let ran = Arc::new(AtomicUsize::new(0));

    // Occupy the only worker so the weak task stays queued
    let blocker = Task::new("/blocker", move || {
        let _ = gate_rx.recv();
    });
    pool.submit(blocker.into()).unwrap();

    let flag = ran.clone();
    let victim = Task::new("/victim", move || {
        flag.fetch_add(1, Ordering::SeqCst);
    });
    pool.submit_weak(&victim).unwrap();
    drop(victim);

    gate_tx.send(()).unwrap();
    pool.shutdown();

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    let stats = pool.stats();
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.discarded, 1);
    assert_eq!(stats.executed, 1);
}

#[test]
fn panicking_task_does_not_kill_worker() {
    let pool = TaskPool::with_workers(1).unwrap();
    pool.submit(Task::new("/panic", || panic!("expected")).into())
        .unwrap();

    let (tx, rx) = bounded(1);
    pool.submit(
        Task::new("/after", move || {
            tx.send("alive").unwrap();
        })
        .into(),
    )
    .unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "alive");
    assert!(wait_for(Duration::from_secs(5), || pool.stats().failed == 1));
}

#[test]
fn task_already_claimed_is_not_run_twice() {
    let pool = TaskPool::with_workers(2).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = runs.clone();
    let task = Task::new("/dup", move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    pool.submit(TaskRef::Strong(task.clone())).unwrap();
    pool.submit(TaskRef::Strong(task.clone())).unwrap();
    pool.shutdown();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn shutdown_drains_queue_and_rejects_new_work() {
    let pool = TaskPool::with_workers(2).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    for _ in 0..20 {
        let counter = runs.clone();
        pool.submit(
            Task::new("/drain", move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .into(),
        )
        .unwrap();
    }

    pool.shutdown();
    assert_eq!(runs.load(Ordering::SeqCst), 20);
    assert!(pool.is_shutdown());

    let result = pool.submit(Task::new("/late", || {}).into());
    assert!(matches!(result, Err(Error::Task(TaskError::PoolShutdown))));

    // Idempotent
    pool.shutdown();
}

#[test]
fn config_controls_worker_count() {
    let pool = TaskPool::new(&TaskPoolConfig {
        worker_threads: 3,
        thread_name_prefix: "unit".to_string(),
    })
    .unwrap();
    assert_eq!(pool.size(), 3);

    let (tx, rx) = bounded(1);
    pool.submit(
        Task::new("/name", move || {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        })
        .into(),
    )
    .unwrap();
    let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert!(name.starts_with("unit-"));
}

#[test]
fn invalid_config_is_rejected() {
    let result = TaskPool::with_workers(0);
    assert!(matches!(result, Err(Error::Config(_))));
}
