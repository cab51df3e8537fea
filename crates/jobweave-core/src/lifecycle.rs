//! Process lifecycle for root jobs.
//!
//! Provides startup/shutdown ordering via priority and graceful shutdown
//! with a timeout. A root job is wrapped in a [`JobLifecycleHook`] so it
//! runs on a blocking thread and is stopped on shutdown.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use jobweave_protocols::Job;

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;

/// Lifecycle errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Cannot {operation} from state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    #[error("Failed to start [{name}]: {reason}")]
    StartFailed { name: String, reason: String },

    #[error("Failed to stop [{name}]: {reason}")]
    StopFailed { name: String, reason: String },

    #[error("Timed out stopping [{0}]")]
    Timeout(String),

    #[error("{0} hooks failed during shutdown")]
    Shutdown(usize),
}

/// Manager state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    /// Initial state, not started.
    Created = 0,
    /// Starting up.
    Starting = 1,
    /// Running.
    Running = 2,
    /// Shutting down.
    ShuttingDown = 3,
    /// Stopped.
    Stopped = 4,
}

impl From<u8> for LifecycleState {
    fn from(v: u8) -> Self {
        match v {
            0 => LifecycleState::Created,
            1 => LifecycleState::Starting,
            2 => LifecycleState::Running,
            3 => LifecycleState::ShuttingDown,
            4 => LifecycleState::Stopped,
            _ => LifecycleState::Created,
        }
    }
}

/// Shutdown signal for graceful shutdown.
#[derive(Clone)]
pub struct ShutdownSignal {
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender }
    }

    pub fn trigger(&self) {
        let _ = self.sender.send(());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Lifecycle hook for managed components.
#[async_trait::async_trait]
pub trait LifecycleHook: Send + Sync {
    fn name(&self) -> &str;

    /// Called during startup.
    async fn on_start(&self) -> Result<(), LifecycleError>;

    /// Called during shutdown.
    async fn on_stop(&self) -> Result<(), LifecycleError>;

    /// Higher starts earlier and stops later.
    fn priority(&self) -> i32 {
        priority::DEFAULT
    }
}

/// Starts hooks by priority and stops them in reverse.
pub struct LifecycleManager {
    state: AtomicU8,
    hooks: RwLock<Vec<Arc<dyn LifecycleHook>>>,
    shutdown_signal: ShutdownSignal,
    shutdown_timeout: Duration,
}

impl LifecycleManager {
    pub fn new(shutdown_timeout: Duration) -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Created as u8),
            hooks: RwLock::new(Vec::new()),
            shutdown_signal: ShutdownSignal::new(),
            shutdown_timeout,
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from(self.state.load(Ordering::SeqCst))
    }

    pub async fn register_hook(&self, hook: Arc<dyn LifecycleHook>) {
        let mut hooks = self.hooks.write().await;
        hooks.push(hook);
        hooks.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown_signal
    }

    /// Start all hooks. If one fails the ones already started are stopped.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        let current = self.state();
        if current != LifecycleState::Created {
            return Err(LifecycleError::InvalidState {
                operation: "start",
                state: current,
            });
        }

        self.state
            .store(LifecycleState::Starting as u8, Ordering::SeqCst);
        info!("Starting...");

        let hooks = self.hooks.read().await;
        for (i, hook) in hooks.iter().enumerate() {
            if let Err(e) = hook.on_start().await {
                error!("Failed to start {}: {}", hook.name(), e);
                for started in hooks.iter().take(i).rev() {
                    let _ = started.on_stop().await;
                }
                self.state
                    .store(LifecycleState::Stopped as u8, Ordering::SeqCst);
                return Err(e);
            }
        }

        self.state
            .store(LifecycleState::Running as u8, Ordering::SeqCst);
        info!("Started");
        Ok(())
    }

    /// Stop all hooks in reverse order, each bounded by the shutdown timeout.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let current = self.state();
        if current != LifecycleState::Running {
            return Err(LifecycleError::InvalidState {
                operation: "stop",
                state: current,
            });
        }

        self.state
            .store(LifecycleState::ShuttingDown as u8, Ordering::SeqCst);
        info!("Shutting down...");
        self.shutdown_signal.trigger();

        let hooks = self.hooks.read().await;
        let mut failures = 0;
        for hook in hooks.iter().rev() {
            match timeout(self.shutdown_timeout, hook.on_stop()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Hook stop error: {}", e);
                    failures += 1;
                }
                Err(_) => {
                    warn!("{}", LifecycleError::Timeout(hook.name().to_string()));
                    failures += 1;
                }
            }
        }

        self.state
            .store(LifecycleState::Stopped as u8, Ordering::SeqCst);
        info!("Stopped");

        if failures == 0 {
            Ok(())
        } else {
            Err(LifecycleError::Shutdown(failures))
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Priority levels (higher = starts earlier, stops later).
pub mod priority {
    pub const INFRASTRUCTURE: i32 = 1000;
    pub const SCHEDULER: i32 = 600;
    pub const JOBS: i32 = 100;
    pub const DEFAULT: i32 = 0;
}

/// Runs a root job on a blocking thread at startup and stops it at
/// shutdown.
pub struct JobLifecycleHook {
    job: Arc<dyn Job>,
    priority: i32,
}

impl JobLifecycleHook {
    pub fn new(job: Arc<dyn Job>) -> Self {
        Self {
            job,
            priority: priority::JOBS,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait::async_trait]
impl LifecycleHook for JobLifecycleHook {
    fn name(&self) -> &str {
        self.job.name()
    }

    async fn on_start(&self) -> Result<(), LifecycleError> {
        debug!(job = %self.job.name(), "Running root job");
        let job = self.job.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = job.run() {
                error!(job = %job.name(), "Root job failed: {}", e);
            }
        });
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), LifecycleError> {
        let Some(_) = self.job.as_stoppable() else {
            return Ok(());
        };
        debug!(job = %self.job.name(), "Stopping root job");
        let job = self.job.clone();
        let name = job.name().to_string();
        tokio::task::spawn_blocking(move || match job.as_stoppable() {
            Some(stoppable) => stoppable.stop(),
            None => Ok(()),
        })
        .await
        .map_err(|e| LifecycleError::StopFailed {
            name: name.clone(),
            reason: e.to_string(),
        })?
        .map_err(|e| LifecycleError::StopFailed {
            name,
            reason: e.to_string(),
        })
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
