use std::time::Duration;

/// Runtime settings of a [`SnapshotCachedSpace`](super::SnapshotCachedSpace).
///
/// Usually built from [`SnapshotConfig`](crate::config::SnapshotConfig).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOptions {
    pub enabled: bool,
    /// Quiet period after the last mutation before a rebuild may run
    pub rebuild_debounce: Duration,
    /// Distinct dirty roots tracked before the whole copy counts as dirty
    pub max_dirty_roots: usize,
    /// Rebuild inline from a stale read; no background worker is started
    pub allow_synchronous_rebuild: bool,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            rebuild_debounce: Duration::from_millis(200),
            max_dirty_roots: 128,
            allow_synchronous_rebuild: false,
        }
    }
}

impl SnapshotOptions {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn rebuild_debounce(
        mut self,
        debounce: Duration,
    ) -> Self {
        self.rebuild_debounce = debounce;
        self
    }

    pub fn max_dirty_roots(
        mut self,
        max: usize,
    ) -> Self {
        self.max_dirty_roots = max;
        self
    }

    pub fn synchronous_rebuild(mut self) -> Self {
        self.allow_synchronous_rebuild = true;
        self
    }
}

/// Per-cache counters, reset whenever the options change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotMetrics {
    pub hits: u64,
    pub misses: u64,
    pub rebuilds: u64,
    pub rebuild_failures: u64,
    /// Encoded size of every value in the published copy
    pub bytes: usize,
    pub last_rebuild_ms: u64,
}
