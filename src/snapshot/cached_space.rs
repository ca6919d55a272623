use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use crossbeam_channel::bounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::DirtyRoots;
use super::SnapshotMetrics;
use super::SnapshotOptions;
use crate::config::SnapshotConfig;
use crate::metrics::SNAPSHOT_LOOKUPS;
use crate::path::Path;
use crate::InOptions;
use crate::InputData;
use crate::InsertReturn;
use crate::OutOptions;
use crate::Space;
use crate::SpaceResult;
use crate::TypeTag;
use crate::Value;
use crate::VisitControl;
use crate::VisitOptions;
use crate::Visitor;

/// Upper bound on how long an idle worker sleeps between schedule checks
const IDLE_WAIT: Duration = Duration::from_secs(1);

/// Minimum gap before retrying after a rebuild that left the copy dirty
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Immutable copy of the front value of every node
#[derive(Debug)]
struct Snapshot {
    values: HashMap<Path, Value>,
}

struct Control {
    options: SnapshotOptions,
    dirty: DirtyRoots,
    /// Bumped on every recorded mutation; a rebuild that sees it move keeps
    /// the copy dirty
    mutations: u64,
    last_mutation: Instant,
    last_attempt: Option<Instant>,
    /// Bumped by `set_snapshot_options`; stale rebuilds are discarded
    epoch: u64,
    rebuild_in_progress: bool,
    worker_running: bool,
    rebuilds: u64,
    rebuild_failures: u64,
    bytes: usize,
    last_rebuild_ms: u64,
}

impl Control {
    fn new(options: SnapshotOptions) -> Self {
        Self {
            dirty: DirtyRoots::new(options.max_dirty_roots),
            options,
            mutations: 0,
            last_mutation: Instant::now(),
            last_attempt: None,
            epoch: 0,
            rebuild_in_progress: false,
            worker_running: false,
            rebuilds: 0,
            rebuild_failures: 0,
            bytes: 0,
            last_rebuild_ms: 0,
        }
    }

    /// Earliest instant a rebuild may start, or `None` when nothing is stale
    fn rebuild_due(&self) -> Option<Instant> {
        if !self.options.enabled || self.dirty.is_empty() {
            return None;
        }
        let debounce = self.options.rebuild_debounce;
        match self.last_attempt {
            Some(attempt) if attempt > self.last_mutation => {
                Some(attempt + debounce.max(RETRY_BACKOFF))
            }
            _ => Some(self.last_mutation + debounce),
        }
    }
}

enum Schedule {
    Now,
    After(Duration),
    Idle,
}

struct Shared {
    backing: Arc<dyn Space>,
    published: ArcSwapOption<Snapshot>,
    control: Mutex<Control>,
    hits: AtomicU64,
    misses: AtomicU64,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl Shared {
    fn mark_dirty(
        &self,
        path: &str,
    ) {
        {
            let mut control = self.control.lock();
            if !control.options.enabled {
                return;
            }
            control.mutations += 1;
            control.last_mutation = Instant::now();
            match Path::parse(path) {
                Ok(parsed) => control.dirty.mark(&parsed),
                Err(_) => control.dirty.mark_all(),
            }
            trace!(path, roots = control.dirty.len(), "snapshot marked dirty");
        }
        let _ = self.wake_tx.try_send(());
    }

    fn next_rebuild(&self) -> Schedule {
        let mut control = self.control.lock();
        if control.rebuild_in_progress {
            return Schedule::Idle;
        }
        match control.rebuild_due() {
            None => Schedule::Idle,
            Some(due) => {
                let now = Instant::now();
                if now >= due {
                    control.rebuild_in_progress = true;
                    Schedule::Now
                } else {
                    Schedule::After(due - now)
                }
            }
        }
    }

    /// Traverses the backing space and publishes a fresh copy.
    ///
    /// The caller must have set `rebuild_in_progress`.
    fn rebuild(&self) -> bool {
        let (start_mutations, epoch) = {
            let mut control = self.control.lock();
            control.last_attempt = Some(Instant::now());
            (control.mutations, control.epoch)
        };

        let started = Instant::now();
        let mut values = HashMap::new();
        let mut bytes = 0;
        let result = self
            .backing
            .visit(&VisitOptions::default(), &mut |entry, handle| {
                if let Some(value) = handle.front() {
                    bytes += value.len();
                    values.insert(entry.path.clone(), value);
                }
                VisitControl::Continue
            });
        let elapsed = started.elapsed();

        let mut control = self.control.lock();
        control.rebuild_in_progress = false;
        if control.epoch != epoch || !control.options.enabled {
            return false;
        }
        if let Err(e) = result {
            control.rebuild_failures += 1;
            warn!(error = %e, failures = control.rebuild_failures, "snapshot rebuild failed");
            return false;
        }

        let entries = values.len();
        self.published.store(Some(Arc::new(Snapshot { values })));
        if control.mutations == start_mutations {
            control.dirty.clear();
        }
        control.rebuilds += 1;
        control.bytes = bytes;
        control.last_rebuild_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        debug!(
            entries,
            bytes,
            duration = ?elapsed,
            still_dirty = !control.dirty.is_empty(),
            "snapshot rebuilt"
        );
        true
    }

    /// Answers a read from the published copy, or `None` to use the live tree
    fn lookup(
        &self,
        path: &str,
        tag: TypeTag,
        options: &OutOptions,
    ) -> Option<Value> {
        if options.pop || options.block.is_blocking() || options.execution.is_some() {
            return None;
        }
        let parsed = Path::parse(path).ok()?;
        if parsed.is_pattern() {
            return None;
        }

        let rebuild_inline = {
            let mut control = self.control.lock();
            if !control.options.enabled {
                return None;
            }
            let due = control.options.allow_synchronous_rebuild
                && !control.worker_running
                && !control.rebuild_in_progress
                && control.rebuild_due().is_some_and(|due| Instant::now() >= due);
            if due {
                control.rebuild_in_progress = true;
            }
            due
        };
        if rebuild_inline {
            self.rebuild();
        }

        {
            let control = self.control.lock();
            if !control.options.enabled {
                return None;
            }
            if control.dirty.covers(&parsed) {
                self.record_miss();
                return None;
            }
        }

        let snapshot = self.published.load();
        let found = snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.values.get(&parsed))
            .filter(|value| value.tag() == tag)
            .cloned();
        match found {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                SNAPSHOT_LOOKUPS.with_label_values(&["hit"]).inc();
                Some(value)
            }
            None => {
                self.record_miss();
                None
            }
        }
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        SNAPSHOT_LOOKUPS.with_label_values(&["miss"]).inc();
    }
}

struct Worker {
    handle: JoinHandle<()>,
    shutdown_tx: Sender<()>,
}

/// A [`Space`] decorator that serves plain reads from an immutable copy of
/// the backing tree.
///
/// Blocking reads, takes, pattern reads and reads with an explicit execution
/// category always go to the backing space. Only mutations made through this
/// decorator mark the copy dirty; a task writing back its result is picked up
/// because the pending slot it replaces is never copied.
///
/// ```
/// use std::sync::Arc;
///
/// use pathspace::snapshot::SnapshotCachedSpace;
/// use pathspace::snapshot::SnapshotOptions;
/// use pathspace::PathSpace;
/// use pathspace::SpaceExt;
///
/// let cache = SnapshotCachedSpace::new(Arc::new(PathSpace::new().unwrap()));
/// cache.set_snapshot_options(SnapshotOptions::enabled().synchronous_rebuild());
/// cache.insert("/config/name", "demo".to_string());
/// cache.rebuild_snapshot_now();
///
/// let name: String = cache.read("/config/name").unwrap();
/// assert_eq!(name, "demo");
/// assert_eq!(cache.snapshot_metrics().hits, 1);
/// ```
pub struct SnapshotCachedSpace {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl SnapshotCachedSpace {
    /// Wraps `backing` with the cache disabled
    pub fn new(backing: Arc<dyn Space>) -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            shared: Arc::new(Shared {
                backing,
                published: ArcSwapOption::empty(),
                control: Mutex::new(Control::new(SnapshotOptions::default())),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                wake_tx,
                wake_rx,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn with_options(
        backing: Arc<dyn Space>,
        options: SnapshotOptions,
    ) -> Self {
        let space = Self::new(backing);
        space.set_snapshot_options(options);
        space
    }

    pub fn with_config(
        backing: Arc<dyn Space>,
        config: &SnapshotConfig,
    ) -> Self {
        Self::with_options(backing, config.into())
    }

    pub fn backing(&self) -> &Arc<dyn Space> {
        &self.shared.backing
    }

    /// Applies new options, dropping the published copy and resetting the
    /// metrics. Enabling marks the whole tree dirty.
    pub fn set_snapshot_options(
        &self,
        options: SnapshotOptions,
    ) {
        let options = SnapshotOptions {
            max_dirty_roots: options.max_dirty_roots.max(1),
            ..options
        };
        let run_worker = options.enabled && !options.allow_synchronous_rebuild;
        {
            let mut control = self.shared.control.lock();
            let epoch = control.epoch + 1;
            let worker_running = control.worker_running;
            *control = Control::new(options);
            control.epoch = epoch;
            control.worker_running = worker_running;
            if control.options.enabled {
                control.dirty.mark_all();
                // The first rebuild is not debounced
                control.last_mutation = Instant::now()
                    .checked_sub(control.options.rebuild_debounce)
                    .unwrap_or_else(Instant::now);
            }
            self.shared.published.store(None);
            self.shared.hits.store(0, Ordering::Relaxed);
            self.shared.misses.store(0, Ordering::Relaxed);
            debug!(
                enabled = control.options.enabled,
                debounce = ?control.options.rebuild_debounce,
                max_dirty_roots = control.options.max_dirty_roots,
                synchronous = control.options.allow_synchronous_rebuild,
                "snapshot options applied"
            );
        }

        if run_worker {
            self.start_worker();
            let _ = self.shared.wake_tx.try_send(());
        } else {
            self.stop_worker();
        }
    }

    pub fn snapshot_options(&self) -> SnapshotOptions {
        self.shared.control.lock().options.clone()
    }

    pub fn snapshot_enabled(&self) -> bool {
        self.shared.control.lock().options.enabled
    }

    /// Rebuilds immediately, ignoring the debounce.
    ///
    /// Returns false when disabled, when another rebuild is running, or when
    /// the traversal failed.
    pub fn rebuild_snapshot_now(&self) -> bool {
        {
            let mut control = self.shared.control.lock();
            if !control.options.enabled || control.rebuild_in_progress {
                return false;
            }
            control.rebuild_in_progress = true;
        }
        self.shared.rebuild()
    }

    pub fn snapshot_metrics(&self) -> SnapshotMetrics {
        let control = self.shared.control.lock();
        SnapshotMetrics {
            hits: self.shared.hits.load(Ordering::Relaxed),
            misses: self.shared.misses.load(Ordering::Relaxed),
            rebuilds: control.rebuilds,
            rebuild_failures: control.rebuild_failures,
            bytes: control.bytes,
            last_rebuild_ms: control.last_rebuild_ms,
        }
    }

    /// Current dirty roots, for diagnostics
    pub fn dirty_roots(&self) -> Vec<Path> {
        self.shared.control.lock().dirty.roots().to_vec()
    }

    fn start_worker(&self) {
        let mut guard = self.worker.lock();
        if guard.is_some() {
            return;
        }

        let (shutdown_tx, shutdown_rx) = bounded(1);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("pathspace-snapshot".to_string())
            .spawn(move || run_worker(shared, shutdown_rx));
        match spawned {
            Ok(handle) => {
                self.shared.control.lock().worker_running = true;
                *guard = Some(Worker {
                    handle,
                    shutdown_tx,
                });
            }
            Err(e) => {
                warn!(error = %e, "failed to spawn snapshot worker; rebuilds only run on demand");
            }
        }
    }

    fn stop_worker(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let _ = worker.shutdown_tx.send(());
        let _ = worker.handle.join();
        self.shared.control.lock().worker_running = false;
    }
}

fn run_worker(
    shared: Arc<Shared>,
    shutdown_rx: Receiver<()>,
) {
    debug!("Snapshot worker started");

    loop {
        let wait = match shared.next_rebuild() {
            Schedule::Now => {
                shared.rebuild();
                continue;
            }
            Schedule::After(wait) => wait,
            Schedule::Idle => IDLE_WAIT,
        };
        crossbeam_channel::select! {
            recv(shutdown_rx) -> _ => {
                debug!("Snapshot worker received shutdown signal");
                break;
            }
            recv(shared.wake_rx) -> _ => {}
            default(wait) => {}
        }
    }

    debug!("Snapshot worker stopped");
}

impl Drop for SnapshotCachedSpace {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

impl Space for SnapshotCachedSpace {
    fn insert_input(
        &self,
        path: &str,
        input: InputData,
        options: &InOptions,
    ) -> InsertReturn {
        let ret = self.shared.backing.insert_input(path, input, options);
        if ret.inserted_any() {
            self.shared.mark_dirty(path);
        }
        ret
    }

    fn out(
        &self,
        path: &str,
        tag: TypeTag,
        options: &OutOptions,
    ) -> SpaceResult<Value> {
        if let Some(value) = self.shared.lookup(path, tag, options) {
            return Ok(value);
        }
        let result = self.shared.backing.out(path, tag, options);
        if result.is_ok() && options.pop {
            self.shared.mark_dirty(path);
        }
        result
    }

    fn find(
        &self,
        pattern: &str,
    ) -> SpaceResult<Vec<Path>> {
        self.shared.backing.find(pattern)
    }

    fn list_children(
        &self,
        path: &str,
    ) -> SpaceResult<Vec<String>> {
        self.shared.backing.list_children(path)
    }

    fn visit(
        &self,
        options: &VisitOptions,
        visitor: &mut Visitor<'_>,
    ) -> SpaceResult<()> {
        self.shared.backing.visit(options, visitor)
    }

    fn remove(
        &self,
        path: &str,
    ) -> SpaceResult<usize> {
        let removed = self.shared.backing.remove(path)?;
        self.shared.mark_dirty(path);
        Ok(removed)
    }

    fn notify(
        &self,
        path: &str,
    ) {
        self.shared.backing.notify(path)
    }

    fn shutdown(&self) {
        self.stop_worker();
        self.shared.backing.shutdown();
    }
}
