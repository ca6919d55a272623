use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

const MAX_SHARDS: usize = 1024;

/// Blocking read/take is coordinated through a fixed set of
/// `(Mutex, Condvar)` shards keyed by path hash.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WaitConfig {
    /// Number of wait shards. Must be a power of two.
    #[serde(default = "default_shard_count")]
    pub shard_count: usize,
}

fn default_shard_count() -> usize {
    16
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            shard_count: default_shard_count(),
        }
    }
}

impl WaitConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_SHARDS).contains(&self.shard_count) || !self.shard_count.is_power_of_two() {
            return Err(Error::Config(ConfigError::Message(format!(
                "wait.shard_count must be a power of two between 1 and {}, got {}",
                MAX_SHARDS, self.shard_count
            ))));
        }
        Ok(())
    }
}
