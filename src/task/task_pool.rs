use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::Task;
use super::TaskRef;
use super::TaskState;
use crate::config::TaskPoolConfig;
use crate::Result;
use crate::TaskError;

/// Point-in-time counters of a [`TaskPool`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskPoolStats {
    pub submitted: u64,
    pub executed: u64,
    pub failed: u64,
    /// Weak references found dead at dequeue time
    pub discarded: u64,
}

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

/// Fixed set of OS worker threads draining a shared MPMC queue.
///
/// # Thread Safety
///
/// `submit` may be called from any thread, including from inside a running
/// task. `shutdown` is idempotent; queued work is drained before the workers
/// exit. Dropping the pool shuts it down.
#[derive(Debug)]
pub struct TaskPool {
    sender: Mutex<Option<Sender<TaskRef>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
    stopped: AtomicBool,
    size: usize,
}

impl TaskPool {
    pub fn new(config: &TaskPoolConfig) -> Result<Self> {
        config.validate()?;

        let (sender, receiver) = unbounded::<TaskRef>();
        let counters = Arc::new(Counters::default());
        let mut workers = Vec::with_capacity(config.worker_threads);

        for index in 0..config.worker_threads {
            let receiver = receiver.clone();
            let counters = counters.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, index))
                .spawn(move || worker_loop(index, receiver, counters))
                .map_err(|e| TaskError::Spawn(e.to_string()))?;
            workers.push(handle);
        }

        debug!(workers = config.worker_threads, "task pool started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            counters,
            stopped: AtomicBool::new(false),
            size: config.worker_threads,
        })
    }

    /// Pool with `worker_threads` workers and the default thread name prefix
    pub fn with_workers(worker_threads: usize) -> Result<Self> {
        Self::new(&TaskPoolConfig {
            worker_threads,
            ..Default::default()
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queues a task. Fails with [`TaskError::PoolShutdown`] once the pool
    /// has stopped accepting work.
    pub fn submit(
        &self,
        task: TaskRef,
    ) -> Result<()> {
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(TaskError::PoolShutdown)?;
        sender.send(task).map_err(|_| TaskError::PoolShutdown)?;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Submits by weak reference; the caller keeps the task alive
    pub fn submit_weak(
        &self,
        task: &Arc<Task>,
    ) -> Result<()> {
        self.submit(TaskRef::weak(task))
    }

    pub fn stats(&self) -> TaskPoolStats {
        TaskPoolStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            executed: self.counters.executed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stops accepting work, lets the workers drain the queue and joins them.
    ///
    /// A worker calling this on its own pool is not joined.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        // Dropping the only sender disconnects the channel once it is empty
        self.sender.lock().take();

        let current = std::thread::current().id();
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!("task pool worker exited abnormally");
            }
        }
        debug!("task pool stopped");
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    index: usize,
    receiver: Receiver<TaskRef>,
    counters: Arc<Counters>,
) {
    trace!(worker = index, "task pool worker started");

    for task_ref in receiver.iter() {
        let Some(task) = task_ref.upgrade() else {
            counters.discarded.fetch_add(1, Ordering::Relaxed);
            trace!(worker = index, "discarding dropped task");
            continue;
        };

        match task.run() {
            Some(TaskState::Failed) => {
                counters.executed.fetch_add(1, Ordering::Relaxed);
                counters.failed.fetch_add(1, Ordering::Relaxed);
            }
            Some(_) => {
                counters.executed.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                trace!(worker = index, task_id = task.id(), "task already ran elsewhere");
            }
        }
    }

    trace!(worker = index, "task pool worker stopped");
}
