use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Upper bound for the computed default worker count
const DEFAULT_WORKER_CAP: usize = 64;
/// Hard upper bound accepted by validation
const MAX_WORKER_THREADS: usize = 256;

/// Task pool sizing
///
/// ```toml
/// [task_pool]
/// worker_threads = 8
/// thread_name_prefix = "pathspace-worker"
/// ```
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TaskPoolConfig {
    /// Number of OS threads executing callables.
    ///
    /// Default: available parallelism, clamped to 1..=64
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Worker threads are named `{prefix}-{index}`
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, DEFAULT_WORKER_CAP)
}

fn default_thread_name_prefix() -> String {
    "pathspace-worker".to_string()
}

impl Default for TaskPoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl TaskPoolConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_WORKER_THREADS).contains(&self.worker_threads) {
            return Err(Error::Config(ConfigError::Message(format!(
                "task_pool.worker_threads must be between 1 and {}, got {}",
                MAX_WORKER_THREADS, self.worker_threads
            ))));
        }

        if self.thread_name_prefix.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "task_pool.thread_name_prefix must not be empty".into(),
            )));
        }

        Ok(())
    }
}
