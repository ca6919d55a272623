use std::any::Any;
use std::fmt;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use parking_lot::Mutex;
use tracing::error;
use tracing::trace;

pub type TaskId = u64;

type Job = Box<dyn FnOnce() + Send + 'static>;
type FailureHandler = Box<dyn FnOnce(String) + Send + 'static>;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Task lifecycle. Transitions only move forward.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    NotStarted = 0,
    /// Claimed for execution and queued on a pool
    Starting = 1,
    Running = 2,
    Completed = 3,
    Failed = 4,
}

impl TaskState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskState::NotStarted,
            1 => TaskState::Starting,
            2 => TaskState::Running,
            3 => TaskState::Completed,
            _ => TaskState::Failed,
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// A callable that executes at most once.
///
/// Panics inside the callable are caught; the task moves to
/// [`TaskState::Failed`] and the optional failure handler receives the
/// panic message. The worker thread survives.
pub struct Task {
    id: TaskId,
    label: String,
    state: AtomicU8,
    job: Mutex<Option<Job>>,
    on_failure: Mutex<Option<FailureHandler>>,
}

impl Task {
    pub fn new<F>(
        label: impl Into<String>,
        job: F,
    ) -> Arc<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Arc::new(Self::build(Self::reserve_id(), label.into(), Box::new(job), None))
    }

    /// Like [`Task::new`], with a handler invoked with the panic message
    /// when the job panics
    pub fn with_failure_handler<F, H>(
        label: impl Into<String>,
        job: F,
        on_failure: H,
    ) -> Arc<Self>
    where
        F: FnOnce() + Send + 'static,
        H: FnOnce(String) + Send + 'static,
    {
        Arc::new(Self::build(
            Self::reserve_id(),
            label.into(),
            Box::new(job),
            Some(Box::new(on_failure)),
        ))
    }

    /// Allocates an id ahead of construction so a job can refer to its own task
    pub(crate) fn reserve_id() -> TaskId {
        NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn with_reserved_id<F, H>(
        id: TaskId,
        label: impl Into<String>,
        job: F,
        on_failure: H,
    ) -> Arc<Self>
    where
        F: FnOnce() + Send + 'static,
        H: FnOnce(String) + Send + 'static,
    {
        Arc::new(Self::build(id, label.into(), Box::new(job), Some(Box::new(on_failure))))
    }

    fn build(
        id: TaskId,
        label: String,
        job: Job,
        on_failure: Option<FailureHandler>,
    ) -> Self {
        Self {
            id,
            label,
            state: AtomicU8::new(TaskState::NotStarted as u8),
            job: Mutex::new(Some(job)),
            on_failure: Mutex::new(on_failure),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Claims the task for execution. Only the first caller wins.
    pub fn try_start(&self) -> bool {
        self.transition(TaskState::NotStarted, TaskState::Starting)
    }

    pub fn is_started(&self) -> bool {
        self.state() != TaskState::NotStarted
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    /// Executes the job on the calling thread.
    ///
    /// Accepts a task that is `NotStarted` or `Starting`; returns `None` when
    /// another caller already ran it. Otherwise returns the final state.
    pub fn run(&self) -> Option<TaskState> {
        if !self.transition(TaskState::Starting, TaskState::Running)
            && !self.transition(TaskState::NotStarted, TaskState::Running)
        {
            trace!(task_id = self.id, "task already claimed by another runner");
            return None;
        }

        let job = self.job.lock().take()?;
        match catch_unwind(AssertUnwindSafe(job)) {
            Ok(()) => {
                self.state.store(TaskState::Completed as u8, Ordering::Release);
                self.on_failure.lock().take();
                Some(TaskState::Completed)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(task_id = self.id, label = %self.label, %message, "task panicked");
                self.state.store(TaskState::Failed as u8, Ordering::Release);
                if let Some(handler) = self.on_failure.lock().take() {
                    if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                        error!(task_id = self.id, "task failure handler panicked");
                    }
                }
                Some(TaskState::Failed)
            }
        }
    }

    fn transition(
        &self,
        from: TaskState,
        to: TaskState,
    ) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl fmt::Debug for Task {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked with a non-string payload".to_string()
    }
}

/// How a task is held while queued on a pool
#[derive(Debug, Clone)]
pub enum TaskRef {
    /// The queue keeps the task alive
    Strong(Arc<Task>),
    /// The task vanishes if every other owner drops it before dequeue
    Weak(Weak<Task>),
}

impl TaskRef {
    pub fn weak(task: &Arc<Task>) -> Self {
        TaskRef::Weak(Arc::downgrade(task))
    }

    pub fn upgrade(&self) -> Option<Arc<Task>> {
        match self {
            TaskRef::Strong(task) => Some(task.clone()),
            TaskRef::Weak(task) => task.upgrade(),
        }
    }
}

impl From<Arc<Task>> for TaskRef {
    fn from(task: Arc<Task>) -> Self {
        TaskRef::Strong(task)
    }
}
