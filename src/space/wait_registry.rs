//! Blocking read/take coordination.
//!
//! Waiters and notifiers meet on a fixed set of `(Mutex, Condvar)` shards
//! selected by path hash. A waiter holds its shard lock from the moment it
//! checks the node until it parks on the condvar; a notifier mutates the
//! node first and only then takes the shard lock to broadcast. A wakeup can
//! therefore never fall between the check and the park. Pattern waiters
//! share one extra shard that every notification also signals while any
//! pattern waiter is registered.
use std::hash::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Condvar;
use parking_lot::Mutex;
use tracing::trace;

use super::Block;
use crate::config::WaitConfig;
use crate::metrics::BLOCK_TIMEOUTS;
use crate::path::Path;
use crate::SpaceError;
use crate::SpaceResult;

#[derive(Default)]
struct WaitShard {
    lock: Mutex<()>,
    cond: Condvar,
}

impl WaitShard {
    fn notify_all(&self) {
        let _guard = self.lock.lock();
        self.cond.notify_all();
    }
}

/// What one attempt of a blocking operation produced
pub(crate) enum Attempt<T> {
    Ready(T),
    /// Nothing usable yet; park and retry
    Retry(SpaceError),
    /// Give up immediately
    Fail(SpaceError),
}

pub(crate) struct WaitRegistry {
    shards: Box<[WaitShard]>,
    mask: usize,
    pattern_shard: WaitShard,
    pattern_waiters: AtomicUsize,
    closed: AtomicBool,
}

impl WaitRegistry {
    pub(crate) fn new(config: &WaitConfig) -> Self {
        let count = config.shard_count.max(1).next_power_of_two();
        Self {
            shards: (0..count).map(|_| WaitShard::default()).collect(),
            mask: count - 1,
            pattern_shard: WaitShard::default(),
            pattern_waiters: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    fn shard_for(
        &self,
        path: &Path,
    ) -> &WaitShard {
        let mut hasher = DefaultHasher::new();
        path.as_str().hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) & self.mask]
    }

    /// Wakes waiters on `path` and, if any exist, pattern waiters
    pub(crate) fn notify(
        &self,
        path: &Path,
    ) {
        self.shard_for(path).notify_all();
        if self.pattern_waiters.load(Ordering::SeqCst) > 0 {
            self.pattern_shard.notify_all();
        }
    }

    /// Wakes every waiter; used on shutdown and for manual notification
    pub(crate) fn notify_everyone(&self) {
        for shard in self.shards.iter() {
            shard.notify_all();
        }
        self.pattern_shard.notify_all();
    }

    /// After closing, waiters stop parking and report their last retry error
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify_everyone();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Runs `attempt` until it yields, the deadline passes or the registry
    /// closes. `attempt` is invoked with the shard lock held and must not
    /// block on anything that could need that same shard.
    pub(crate) fn wait_until<T>(
        &self,
        path: &Path,
        block: Block,
        mut attempt: impl FnMut() -> Attempt<T>,
    ) -> SpaceResult<T> {
        let shard = if path.is_pattern() {
            self.pattern_waiters.fetch_add(1, Ordering::SeqCst);
            &self.pattern_shard
        } else {
            self.shard_for(path)
        };
        let _registration = PatternRegistration {
            registry: self,
            active: path.is_pattern(),
        };

        let deadline = block.deadline(Instant::now());
        let mut guard = shard.lock.lock();
        loop {
            let last = match attempt() {
                Attempt::Ready(value) => return Ok(value),
                Attempt::Fail(err) => return Err(err),
                Attempt::Retry(err) => err,
            };

            if !block.is_blocking() || self.is_closed() {
                return Err(last);
            }

            match deadline {
                None => shard.cond.wait(&mut guard),
                Some(deadline) => {
                    if Instant::now() >= deadline
                        || shard.cond.wait_until(&mut guard, deadline).timed_out()
                    {
                        // One last look; the notification may have raced the deadline
                        return match attempt() {
                            Attempt::Ready(value) => Ok(value),
                            Attempt::Fail(err) => Err(err),
                            Attempt::Retry(_) => {
                                BLOCK_TIMEOUTS.inc();
                                trace!(path = %path, "blocking wait timed out");
                                Err(SpaceError::Timeout {
                                    path: path.to_string(),
                                    duration: block_duration(block),
                                })
                            }
                        };
                    }
                }
            }
        }
    }
}

fn block_duration(block: Block) -> Duration {
    match block {
        Block::Timeout(d) => d,
        _ => Duration::ZERO,
    }
}

struct PatternRegistration<'a> {
    registry: &'a WaitRegistry,
    active: bool,
}

impl Drop for PatternRegistration<'_> {
    fn drop(&mut self) {
        if self.active {
            self.registry.pattern_waiters.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
