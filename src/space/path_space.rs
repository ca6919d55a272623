use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::api::InputData;
use super::api::TaskInput;
use super::api::Visitor;
use super::node::Node;
use super::node::Slot;
use super::wait_registry::Attempt;
use super::wait_registry::WaitRegistry;
use super::Block;
use super::ExecutionCategory;
use super::InOptions;
use super::InsertReturn;
use super::OutOptions;
use super::PathEntry;
use super::Space;
use super::TypeTag;
use super::Value;
use super::ValueHandle;
use super::VisitControl;
use super::VisitOptions;
use crate::config::SpaceConfig;
use crate::config::WaitConfig;
use crate::metrics::TAKES;
use crate::metrics::TASKS_INSERTED;
use crate::metrics::TASK_FAILURES;
use crate::metrics::VALUES_INSERTED;
use crate::path::is_glob;
use crate::path::GlobName;
use crate::path::Path;
use crate::task::Task;
use crate::task::TaskId;
use crate::task::TaskPool;
use crate::Result;
use crate::SpaceError;
use crate::SpaceResult;

pub(crate) struct SpaceInner {
    root: Arc<Node>,
    waits: WaitRegistry,
    pool: Arc<TaskPool>,
    owns_pool: bool,
    closed: AtomicBool,
    /// Spaces this one is mounted in, so writes here wake their waiters
    mounted_in: Mutex<Vec<MountLink>>,
}

/// Back reference from a mounted space to the space holding it
struct MountLink {
    parent: Weak<SpaceInner>,
    at: Path,
}

/// The path-addressed store.
///
/// `PathSpace` is a cheap `Clone` handle; all clones share one tree. Every
/// operation may be called from any number of threads at once.
///
/// # Example
///
/// ```
/// use pathspace::PathSpace;
/// use pathspace::SpaceExt;
///
/// let space = PathSpace::new().unwrap();
/// space.insert("/jobs/next", 1u32);
/// space.insert("/jobs/next", 2u32);
/// assert_eq!(space.take::<u32>("/jobs/next"), Ok(1));
/// assert_eq!(space.read::<u32>("/jobs/next"), Ok(2));
/// ```
#[derive(Clone)]
pub struct PathSpace {
    inner: Arc<SpaceInner>,
}

/// Where a concrete path lands
enum Target {
    Local(Arc<Node>),
    /// Below a mount point; the rest of the path belongs to the nested space
    Nested(PathSpace, Path),
}

/// Successful attempt of a read or take
enum OutOutcome {
    Value(Value),
    Delegate(PathSpace, Path),
}

/// What to do with the head slot, decided under the node lock
enum HeadAction {
    Return(Value),
    Failed(String),
    Start(Arc<Task>),
    Wait,
}

impl PathSpace {
    /// Space with a private task pool sized from the default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(&SpaceConfig::default())
    }

    pub fn with_config(config: &SpaceConfig) -> Result<Self> {
        let pool = Arc::new(TaskPool::new(&config.task_pool)?);
        Ok(Self::build(pool, true, &config.wait))
    }

    /// Space running its callables on a pool shared with other spaces.
    /// `shutdown` leaves a shared pool running.
    pub fn with_pool(
        pool: Arc<TaskPool>,
        wait: &WaitConfig,
    ) -> Self {
        Self::build(pool, false, wait)
    }

    fn build(
        pool: Arc<TaskPool>,
        owns_pool: bool,
        wait: &WaitConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SpaceInner {
                root: Arc::new(Node::default()),
                waits: WaitRegistry::new(wait),
                pool,
                owns_pool,
                closed: AtomicBool::new(false),
                mounted_in: Mutex::new(Vec::new()),
            }),
        }
    }

    fn from_inner(inner: Arc<SpaceInner>) -> Self {
        Self { inner }
    }

    pub fn pool(&self) -> &Arc<TaskPool> {
        &self.inner.pool
    }

    /// Mounts `space` at `path`. Later operations below `path` are
    /// forwarded into it.
    pub fn mount(
        &self,
        path: &str,
        space: PathSpace,
    ) -> InsertReturn {
        self.insert_input(path, InputData::Space(space), &InOptions::default())
    }

    /// Drops every node and value
    pub fn clear(&self) {
        self.inner.root.clear_children();
        self.inner.root.slots().clear();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn ptr_eq(
        &self,
        other: &PathSpace,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ---------------------------------------------------------------------
    // Resolution

    fn locate(
        &self,
        path: &Path,
        create: bool,
    ) -> SpaceResult<Target> {
        let components: Vec<&str> = path.components().collect();
        let mut node = self.inner.root.clone();
        for (index, name) in components.iter().enumerate() {
            node = if create {
                node.child_or_insert(name)
            } else {
                node.child(name).ok_or_else(|| SpaceError::NoSuchPath {
                    path: path.to_string(),
                })?
            };

            if index + 1 < components.len() {
                if let Some(nested) = node.nested() {
                    let rest = Path::from_components(&components[index + 1..]);
                    return Ok(Target::Nested(Self::from_inner(nested), rest));
                }
            }
        }
        Ok(Target::Local(node))
    }

    /// Existing concrete paths matching `pattern`, depth-first in child
    /// insertion order, without duplicates and never the root
    fn expand(
        &self,
        pattern: &[&str],
    ) -> Vec<Path> {
        let mut found = Vec::new();
        expand_into(&self.inner.root, &Path::root(), pattern, &mut found);

        let mut seen = HashSet::new();
        found.retain(|p| !p.is_root() && seen.insert(p.clone()));
        found
    }

    /// `target` is this space or is mounted somewhere below it
    fn contains_space(
        &self,
        target: &Arc<SpaceInner>,
    ) -> bool {
        Arc::ptr_eq(&self.inner, target) || subtree_contains_space(&self.inner.root, target)
    }

    /// True while `child` is still the space mounted at `at`
    fn is_mounted_at(
        &self,
        at: &Path,
        child: &Arc<SpaceInner>,
    ) -> bool {
        let mut node = self.inner.root.clone();
        for name in at.components() {
            match node.child(name) {
                Some(next) => node = next,
                None => return false,
            }
        }
        node.nested().is_some_and(|nested| Arc::ptr_eq(&nested, child))
    }

    fn unlink_from(
        &self,
        parent: &Arc<SpaceInner>,
        at: &Path,
    ) {
        self.inner
            .mounted_in
            .lock()
            .retain(|link| !(link.at == *at && std::ptr::eq(link.parent.as_ptr(), Arc::as_ptr(parent))));
    }

    /// Wakes waiters on `path` here and, translated through each mount
    /// point, in every space this one is still mounted in
    fn notify_change(
        &self,
        path: &Path,
    ) {
        self.inner.waits.notify(path);

        let links: Vec<(Arc<SpaceInner>, Path)> = {
            let mut mounted_in = self.inner.mounted_in.lock();
            mounted_in.retain(|link| link.parent.strong_count() > 0);
            mounted_in
                .iter()
                .filter_map(|link| link.parent.upgrade().map(|parent| (parent, link.at.clone())))
                .collect()
        };
        for (parent, at) in links {
            let parent = Self::from_inner(parent);
            if parent.is_mounted_at(&at, &self.inner) {
                trace!(mount = %at, path = %path, "forwarding notification to parent space");
                parent.notify_change(&at.join_path(path));
            }
        }
    }

    // ---------------------------------------------------------------------
    // Insert

    fn insert_parsed(
        &self,
        path: &Path,
        input: &InputData,
        options: &InOptions,
    ) -> InsertReturn {
        if self.is_shutdown() {
            return InsertReturn::error(SpaceError::InvalidPermissions(format!(
                "space is shut down; insert at {path} rejected"
            )));
        }

        let mut ret = InsertReturn::default();
        if !path.is_pattern() {
            self.insert_concrete(path, input, options, &mut ret);
            return ret;
        }

        if matches!(input, InputData::Space(_)) {
            return InsertReturn::error(SpaceError::InvalidPath {
                path: path.to_string(),
                reason: "cannot mount a space through a glob",
            });
        }

        // Globs only select existing nodes; literal components after the
        // last glob are created below each match
        let components: Vec<&str> = path.components().collect();
        let last_glob = components.iter().rposition(|c| is_glob(c)).unwrap_or(0);
        let (selector, suffix) = components.split_at(last_glob + 1);
        let suffix = Path::from_components(suffix);

        let matches = self.expand(selector);
        trace!(pattern = %path, matches = matches.len(), "broadcast insert");
        for target in matches {
            self.insert_concrete(&target.join_path(&suffix), input, options, &mut ret);
        }
        ret
    }

    fn insert_concrete(
        &self,
        path: &Path,
        input: &InputData,
        options: &InOptions,
        ret: &mut InsertReturn,
    ) {
        let node = match self.locate(path, true) {
            Ok(Target::Local(node)) => node,
            Ok(Target::Nested(space, rest)) => {
                ret.merge(space.insert_parsed(&rest, input, options));
                return;
            }
            Err(e) => {
                ret.errors.push(e);
                return;
            }
        };

        match input {
            InputData::Value(value) => {
                let mut slots = node.slots();
                if options.replace_existing {
                    slots.clear();
                }
                slots.push_back(Slot::Value(value.clone()));
                drop(slots);

                ret.values_inserted += 1;
                VALUES_INSERTED.inc();
            }
            InputData::Task(task) => {
                self.insert_task_slot(&node, path, task, options);
                ret.tasks_inserted += 1;
                TASKS_INSERTED.inc();
            }
            InputData::Space(space) => {
                if space.contains_space(&self.inner) {
                    ret.errors.push(SpaceError::InvalidPath {
                        path: path.to_string(),
                        reason: "mount would create a cycle",
                    });
                    return;
                }
                if let Some(previous) = node.set_nested(Some(space.inner.clone())) {
                    Self::from_inner(previous).unlink_from(&self.inner, path);
                }
                space.inner.mounted_in.lock().push(MountLink {
                    parent: Arc::downgrade(&self.inner),
                    at: path.clone(),
                });
                ret.spaces_inserted += 1;
                debug!(path = %path, "nested space mounted");
                // Waiters below the mount point hash to arbitrary shards
                self.inner.waits.notify_everyone();
                return;
            }
        }

        self.notify_change(path);
    }

    fn insert_task_slot(
        &self,
        node: &Node,
        path: &Path,
        input: &TaskInput,
        options: &InOptions,
    ) {
        let task = self.make_task(path, input);
        {
            let mut slots = node.slots();
            if options.replace_existing {
                slots.clear();
            }
            slots.push_back(Slot::Pending {
                task: task.clone(),
                tag: input.tag,
            });
        }

        if options.execution == ExecutionCategory::Immediate && task.try_start() {
            self.start_task(node, &task);
        }
    }

    /// The task reaches its slot by path through a weak space handle, so a
    /// removed node or a dropped space just discards the result
    fn make_task(
        &self,
        path: &Path,
        input: &TaskInput,
    ) -> Arc<Task> {
        let id = Task::reserve_id();
        let producer = input.producer.clone();
        let space = Arc::downgrade(&self.inner);
        let target = path.clone();
        let failed_space = space.clone();
        let failed_target = target.clone();

        Task::with_reserved_id(
            id,
            path.as_str(),
            move || {
                let outcome = producer().map_err(|e| e.to_string());
                complete_task(&space, &target, id, outcome);
            },
            move |message| {
                TASK_FAILURES.inc();
                complete_task(&failed_space, &failed_target, id, Err(message));
            },
        )
    }

    /// Queues a claimed task. On rejection the slot is marked failed and
    /// `false` is returned. Never notifies.
    fn start_task(
        &self,
        node: &Node,
        task: &Arc<Task>,
    ) -> bool {
        match self.inner.pool.submit_weak(task) {
            Ok(()) => true,
            Err(e) => {
                warn!(task_id = task.id(), error = %e, "task could not be queued");
                resolve_slot(node, task.id(), Err(e.to_string()));
                false
            }
        }
    }

    fn resolve_task(
        &self,
        path: &Path,
        task_id: TaskId,
        outcome: std::result::Result<Value, String>,
    ) {
        let node = match self.locate(path, false) {
            Ok(Target::Local(node)) => node,
            _ => {
                debug!(path = %path, task_id, "task target is gone; dropping result");
                return;
            }
        };

        if resolve_slot(&node, task_id, outcome) {
            self.notify_change(path);
        } else {
            debug!(path = %path, task_id, "pending slot was removed; dropping result");
        }
    }

    // ---------------------------------------------------------------------
    // Read / take

    fn out_parsed(
        &self,
        path: &Path,
        tag: TypeTag,
        options: &OutOptions,
    ) -> SpaceResult<Value> {
        let start = Instant::now();
        let outcome = self
            .inner
            .waits
            .wait_until(path, options.block, || self.attempt_out(path, tag, options))?;

        match outcome {
            OutOutcome::Value(value) => Ok(value),
            OutOutcome::Delegate(space, rest) => {
                let remaining = OutOptions {
                    block: remaining_block(options.block, start),
                    ..*options
                };
                space.out_parsed(&rest, tag, &remaining)
            }
        }
    }

    fn attempt_out(
        &self,
        path: &Path,
        tag: TypeTag,
        options: &OutOptions,
    ) -> Attempt<OutOutcome> {
        if path.is_pattern() {
            return self.attempt_out_pattern(path, tag, options);
        }

        match self.locate(path, false) {
            Err(e) => Attempt::Retry(e),
            Ok(Target::Nested(space, rest)) => Attempt::Ready(OutOutcome::Delegate(space, rest)),
            Ok(Target::Local(node)) => match self.attempt_node(&node, path, tag, options) {
                Attempt::Ready(v) => Attempt::Ready(OutOutcome::Value(v)),
                Attempt::Retry(e) => Attempt::Retry(e),
                Attempt::Fail(e) => Attempt::Fail(e),
            },
        }
    }

    /// First match in enumeration order that yields wins. Without a winner
    /// a hard failure (type mismatch, failed task) is reported before
    /// not-found.
    fn attempt_out_pattern(
        &self,
        pattern: &Path,
        tag: TypeTag,
        options: &OutOptions,
    ) -> Attempt<OutOutcome> {
        let components: Vec<&str> = pattern.components().collect();
        let matches = self.expand(&components);
        if matches.is_empty() {
            return Attempt::Retry(SpaceError::NoSuchPath {
                path: pattern.to_string(),
            });
        }

        let single = OutOptions {
            block: Block::NonBlocking,
            ..*options
        };
        let mut hard_failure = None;
        for path in &matches {
            let attempt = match self.locate(path, false) {
                Ok(Target::Local(node)) => self.attempt_node(&node, path, tag, &single),
                Ok(Target::Nested(space, rest)) => match space.out_parsed(&rest, tag, &single) {
                    Ok(v) => Attempt::Ready(v),
                    Err(e) if e.is_not_found() => Attempt::Retry(e),
                    Err(e) => Attempt::Fail(e),
                },
                Err(e) => Attempt::Retry(e),
            };
            match attempt {
                Attempt::Ready(v) => return Attempt::Ready(OutOutcome::Value(v)),
                Attempt::Fail(e) => {
                    hard_failure.get_or_insert(e);
                }
                Attempt::Retry(_) => {}
            }
        }

        match hard_failure {
            Some(e) => Attempt::Fail(e),
            None => Attempt::Retry(SpaceError::NoObjectFound {
                path: pattern.to_string(),
            }),
        }
    }

    /// One non-blocking look at the head of a node's queue.
    ///
    /// Only the head is considered; a head of another type is `InvalidType`
    /// even when a later slot would fit.
    fn attempt_node(
        &self,
        node: &Node,
        path: &Path,
        tag: TypeTag,
        options: &OutOptions,
    ) -> Attempt<Value> {
        let not_found = || SpaceError::NoObjectFound {
            path: path.to_string(),
        };

        // A second pass is needed only when a lazy task is rejected by the pool
        for _ in 0..2 {
            let action = {
                let mut slots = node.slots();
                let Some(head) = slots.front() else {
                    return Attempt::Retry(not_found());
                };
                if head.tag() != tag {
                    return Attempt::Fail(SpaceError::InvalidType {
                        path: path.to_string(),
                        expected: tag.name(),
                        found: head.tag().name(),
                    });
                }

                let action = match head {
                    Slot::Value(v) => HeadAction::Return(v.clone()),
                    Slot::Failed { message, .. } => HeadAction::Failed(message.clone()),
                    Slot::Pending { task, .. } => {
                        if options.starts_lazy_tasks() && task.try_start() {
                            HeadAction::Start(task.clone())
                        } else {
                            HeadAction::Wait
                        }
                    }
                };
                if options.pop && matches!(action, HeadAction::Return(_) | HeadAction::Failed(_)) {
                    slots.pop_front();
                }
                action
            };

            match action {
                HeadAction::Return(v) => {
                    if options.pop {
                        TAKES.inc();
                    }
                    return Attempt::Ready(v);
                }
                HeadAction::Failed(message) => {
                    return Attempt::Fail(SpaceError::TaskFailed {
                        path: path.to_string(),
                        message,
                    });
                }
                HeadAction::Wait => return Attempt::Retry(not_found()),
                HeadAction::Start(task) => {
                    trace!(path = %path, task_id = task.id(), "starting lazy task");
                    if self.start_task(node, &task) {
                        return Attempt::Retry(not_found());
                    }
                }
            }
        }
        Attempt::Retry(not_found())
    }

    // ---------------------------------------------------------------------
    // Traversal and removal

    fn visit_at(
        &self,
        local: &Path,
        shown: &Path,
        options: &VisitOptions,
        visitor: &mut Visitor<'_>,
    ) -> SpaceResult<()> {
        match self.locate(local, false)? {
            Target::Nested(space, rest) => space.visit_at(&rest, shown, options, visitor),
            Target::Local(node) => {
                walk(&node, shown, 0, options, visitor, true);
                Ok(())
            }
        }
    }

    fn remove_parsed(
        &self,
        path: &Path,
    ) -> SpaceResult<usize> {
        if path.is_root() {
            let dropped = self.inner.root.subtree_slot_count();
            self.clear();
            return Ok(dropped);
        }

        if path.is_pattern() {
            let components: Vec<&str> = path.components().collect();
            let mut dropped = 0;
            for target in self.expand(&components) {
                match self.remove_parsed(&target) {
                    Ok(n) => dropped += n,
                    // An earlier match may have contained this one
                    Err(SpaceError::NoSuchPath { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
            return Ok(dropped);
        }

        if let Target::Nested(space, rest) = self.locate(path, false)? {
            return space.remove_parsed(&rest);
        }

        let parent = path.parent().unwrap_or_else(Path::root);
        let name = path.name().unwrap_or_default();
        let Target::Local(parent) = self.locate(&parent, false)? else {
            return Err(SpaceError::UnknownError(format!(
                "parent of {path} resolved into a nested space"
            )));
        };
        let removed = parent.remove_child(name).ok_or_else(|| SpaceError::NoSuchPath {
            path: path.to_string(),
        })?;
        let dropped = removed.subtree_slot_count();
        debug!(path = %path, dropped, "subtree removed");
        Ok(dropped)
    }

    fn shutdown_nested(node: &Node) {
        if let Some(nested) = node.nested() {
            Self::from_inner(nested).shutdown();
        }
        for (_, child) in node.children() {
            Self::shutdown_nested(&child);
        }
    }
}

impl Space for PathSpace {
    fn insert_input(
        &self,
        path: &str,
        input: InputData,
        options: &InOptions,
    ) -> InsertReturn {
        match Path::parse(path) {
            Ok(path) => self.insert_parsed(&path, &input, options),
            Err(e) => InsertReturn::error(e),
        }
    }

    fn out(
        &self,
        path: &str,
        tag: TypeTag,
        options: &OutOptions,
    ) -> SpaceResult<Value> {
        let path = Path::parse(path)?;
        self.out_parsed(&path, tag, options)
    }

    fn find(
        &self,
        pattern: &str,
    ) -> SpaceResult<Vec<Path>> {
        let pattern = Path::parse(pattern)?;
        let components: Vec<&str> = pattern.components().collect();
        Ok(self.expand(&components))
    }

    fn list_children(
        &self,
        path: &str,
    ) -> SpaceResult<Vec<String>> {
        let path = Path::parse_location(path)?;
        if path.is_pattern() {
            return Err(SpaceError::InvalidPath {
                path: path.to_string(),
                reason: "listing children requires a concrete path",
            });
        }

        match self.locate(&path, false)? {
            Target::Nested(space, rest) => space.list_children(rest.as_str()),
            Target::Local(node) => match node.nested() {
                Some(nested) if !path.is_root() => Self::from_inner(nested).list_children("/"),
                _ => Ok(node.children().into_iter().map(|(name, _)| name).collect()),
            },
        }
    }

    fn visit(
        &self,
        options: &VisitOptions,
        visitor: &mut Visitor<'_>,
    ) -> SpaceResult<()> {
        let root = Path::parse_location(&options.root)?;
        if root.is_pattern() {
            return Err(SpaceError::InvalidPath {
                path: root.to_string(),
                reason: "visit root must be a concrete path",
            });
        }
        self.visit_at(&root, &root, options, visitor)
    }

    fn remove(
        &self,
        path: &str,
    ) -> SpaceResult<usize> {
        let path = Path::parse_location(path)?;
        self.remove_parsed(&path)
    }

    fn notify(
        &self,
        path: &str,
    ) {
        match Path::parse_location(path) {
            Ok(path) if path.is_root() => self.inner.waits.notify_everyone(),
            Ok(path) => self.inner.waits.notify(&path),
            Err(e) => debug!(error = %e, "notify ignored"),
        }
    }

    /// Rejects further inserts, wakes every waiter and stops an owned pool.
    /// Mounted spaces are shut down too.
    fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.waits.close();
        Self::shutdown_nested(&self.inner.root);
        if self.inner.owns_pool {
            self.inner.pool.shutdown();
        }
        debug!("space shut down");
    }
}

impl fmt::Debug for PathSpace {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("PathSpace")
            .field("closed", &self.is_shutdown())
            .field("workers", &self.inner.pool.size())
            .finish_non_exhaustive()
    }
}

fn complete_task(
    space: &Weak<SpaceInner>,
    path: &Path,
    task_id: TaskId,
    outcome: std::result::Result<Value, String>,
) {
    match space.upgrade() {
        Some(inner) => PathSpace::from_inner(inner).resolve_task(path, task_id, outcome),
        None => debug!(path = %path, task_id, "space dropped before task finished"),
    }
}

/// Replaces the pending slot of `task_id` in place, keeping its FIFO position
fn resolve_slot(
    node: &Node,
    task_id: TaskId,
    outcome: std::result::Result<Value, String>,
) -> bool {
    let mut slots = node.slots();
    let Some(slot) = slots
        .iter_mut()
        .find(|slot| matches!(slot, Slot::Pending { task, .. } if task.id() == task_id))
    else {
        return false;
    };

    let tag = slot.tag();
    *slot = match outcome {
        Ok(value) => Slot::Value(value),
        Err(message) => Slot::Failed { tag, message },
    };
    true
}

fn remaining_block(
    block: Block,
    start: Instant,
) -> Block {
    match block {
        Block::Timeout(d) => Block::Timeout(d.saturating_sub(start.elapsed())),
        other => other,
    }
}

fn expand_into(
    node: &Node,
    base: &Path,
    pattern: &[&str],
    found: &mut Vec<Path>,
) {
    let Some((head, rest)) = pattern.split_first() else {
        found.push(base.clone());
        return;
    };

    if !base.is_root() {
        if let Some(nested) = node.nested() {
            if pattern.iter().all(|c| GlobName::new(c).is_multi_level()) {
                found.push(base.clone());
            }
            let nested = PathSpace::from_inner(nested);
            found.extend(nested.expand(pattern).iter().map(|p| base.join_path(p)));
            return;
        }
    }

    let glob = GlobName::new(head);
    if glob.is_multi_level() {
        expand_into(node, base, rest, found);
        for (name, child) in node.children() {
            expand_into(&child, &base.child(&name), pattern, found);
        }
    } else if glob.is_glob() {
        for (name, child) in node.children() {
            if glob.matches(&name) {
                expand_into(&child, &base.child(&name), rest, found);
            }
        }
    } else if let Some(child) = node.child(head) {
        expand_into(&child, &base.child(head), rest, found);
    }
}

fn subtree_contains_space(
    node: &Node,
    target: &Arc<SpaceInner>,
) -> bool {
    if let Some(nested) = node.nested() {
        if PathSpace::from_inner(nested).contains_space(target) {
            return true;
        }
    }
    node.children()
        .iter()
        .any(|(_, child)| subtree_contains_space(child, target))
}

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

fn walk(
    node: &Node,
    shown: &Path,
    depth: usize,
    options: &VisitOptions,
    visitor: &mut Visitor<'_>,
    emit: bool,
) -> Flow {
    let nested = node.nested();

    if emit {
        let entry = PathEntry {
            path: shown.clone(),
            depth,
            has_children: node.has_children()
                || nested.as_ref().is_some_and(|n| n.root.has_children()),
            queue_depth: node.slots().len(),
            is_nested_mount: nested.is_some(),
        };
        let handle = ValueHandle::new(node, shown, options.include_values);
        match visitor(&entry, &handle) {
            VisitControl::Stop => return Flow::Stop,
            VisitControl::SkipChildren => return Flow::Continue,
            VisitControl::Continue => {}
        }
    }

    if !options.descend_allowed(depth) {
        return Flow::Continue;
    }

    if let Some(nested) = nested {
        if !options.include_nested_spaces {
            return Flow::Continue;
        }
        // The nested root is not reported; its children appear under the mount
        return walk(&nested.root, shown, depth, options, visitor, false);
    }

    let limit = options.max_children.unwrap_or(usize::MAX);
    for (name, child) in node.children().into_iter().take(limit) {
        if walk(&child, &shown.child(&name), depth + 1, options, visitor, true) == Flow::Stop {
            return Flow::Stop;
        }
    }
    Flow::Continue
}
