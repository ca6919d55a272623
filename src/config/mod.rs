//! Configuration management for the path space.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`PATHSPACE__` prefix)
//! - Component-wise validation
mod snapshot;
mod task_pool;
mod wait;
pub use snapshot::*;
pub use task_pool::*;
pub use wait::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment prefix for overrides, e.g. `PATHSPACE__TASK_POOL__WORKER_THREADS=8`
pub const ENV_PREFIX: &str = "PATHSPACE";

/// Main configuration container for a space instance
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct SpaceConfig {
    /// Worker threads executing inserted callables
    #[serde(default)]
    pub task_pool: TaskPoolConfig,
    /// Blocking read/take wait primitives
    #[serde(default)]
    pub wait: WaitConfig,
    /// Read-side snapshot cache
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

impl SpaceConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults
    /// 2. Configuration file from the `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with the `PATHSPACE__` prefix
    ///
    /// Callers must call [`SpaceConfig::validate`] before use.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("PATHSPACE__WAIT__SHARD_COUNT", "32");
    /// let cfg = SpaceConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from a file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every subsystem and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.task_pool.validate()?;
        self.wait.validate()?;
        self.snapshot.validate()?;
        Ok(self)
    }
}
