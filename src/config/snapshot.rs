use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::snapshot::SnapshotOptions;
use crate::Error;
use crate::Result;

/// Snapshot cache settings
///
/// ```toml
/// [snapshot]
/// enabled = true
/// rebuild_debounce_ms = 200
/// max_dirty_roots = 128
/// allow_synchronous_rebuild = false
/// ```
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SnapshotConfig {
    /// Serve eligible reads from an immutable copy of the tree.
    ///
    /// Default: false
    #[serde(default)]
    pub enabled: bool,

    /// Quiet period after the last mutation before a rebuild runs
    #[serde(default = "default_rebuild_debounce_ms")]
    pub rebuild_debounce_ms: u64,

    /// Distinct dirty prefixes tracked before the whole snapshot is
    /// considered dirty
    #[serde(default = "default_max_dirty_roots")]
    pub max_dirty_roots: usize,

    /// Rebuild inline on a stale read instead of in a background worker
    #[serde(default)]
    pub allow_synchronous_rebuild: bool,
}

fn default_rebuild_debounce_ms() -> u64 {
    200
}

fn default_max_dirty_roots() -> usize {
    128
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rebuild_debounce_ms: default_rebuild_debounce_ms(),
            max_dirty_roots: default_max_dirty_roots(),
            allow_synchronous_rebuild: false,
        }
    }
}

impl SnapshotConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_dirty_roots == 0 {
            return Err(Error::Config(ConfigError::Message(
                "snapshot.max_dirty_roots must be at least 1".into(),
            )));
        }
        Ok(())
    }

    pub fn rebuild_debounce(&self) -> Duration {
        Duration::from_millis(self.rebuild_debounce_ms)
    }
}

impl From<&SnapshotConfig> for SnapshotOptions {
    fn from(config: &SnapshotConfig) -> Self {
        SnapshotOptions {
            enabled: config.enabled,
            rebuild_debounce: config.rebuild_debounce(),
            max_dirty_roots: config.max_dirty_roots.max(1),
            allow_synchronous_rebuild: config.allow_synchronous_rebuild,
        }
    }
}
