//! Configuration schema definitions.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use jobweave_scheduling::{Keyword, RetrySpec, ScheduleSpec, TimerSpec};

use crate::loader::ConfigLoader;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub scheduling: SchedulingConfig,

    #[serde(default)]
    pub timers: Vec<TimerSpec>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `jobweave_scheduling=debug`.
    /// `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,

    /// Write a daily rotated log file here as well as to the console.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl LoggingConfig {
    /// The log directory with `~` expanded.
    pub fn directory(&self) -> Option<PathBuf> {
        self.directory
            .as_deref()
            .map(|dir| PathBuf::from(ConfigLoader::expand_path(dir)))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            directory: None,
            file_prefix: default_file_prefix(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "jobweave.log".to_string()
}

/// Scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Longest wait for a job's state lock. 0 waits forever.
    #[serde(default)]
    pub lock_timeout_ms: u64,

    /// Worker threads for the executor that fires timers.
    #[serde(default = "default_executor_threads")]
    pub executor_threads: usize,

    /// How long stopping a timer waits for its job.
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl SchedulingConfig {
    pub fn lock_timeout(&self) -> Option<Duration> {
        (self.lock_timeout_ms > 0).then(|| Duration::from_millis(self.lock_timeout_ms))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 0,
            executor_threads: default_executor_threads(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

fn default_executor_threads() -> usize {
    2
}

fn default_stop_timeout_ms() -> u64 {
    5_000
}
