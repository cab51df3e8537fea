//! Running actions after a delay.
//!
//! [`TokioScheduledExecutor`] waits on the tokio timer and runs the action
//! on the blocking pool, since actions run jobs synchronously.
//! [`ManualExecutor`] records actions and runs them when told, for tests.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// An action to run once.
pub type Action = Box<dyn FnOnce() + Send>;

/// Schedules actions to run after a delay.
pub trait ScheduledExecutor: Send + Sync {
    fn schedule(&self, action: Action, delay: Duration) -> Arc<dyn ScheduledHandle>;
}

/// A pending scheduled action.
pub trait ScheduledHandle: Send + Sync {
    /// Cancel if the action has not started. Never interrupts a running
    /// action. Returns true if this call cancelled it.
    fn cancel(&self) -> bool;

    fn is_cancelled(&self) -> bool;
}

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;

#[derive(Debug, Default)]
struct Status(AtomicU8);

impl Status {
    fn claim(&self) -> bool {
        self.0
            .compare_exchange(PENDING, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn cancel(&self) -> bool {
        self.0
            .compare_exchange(PENDING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn get(&self) -> u8 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Executor backed by a tokio runtime.
#[derive(Clone)]
pub struct TokioScheduledExecutor {
    handle: Handle,
}

impl TokioScheduledExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime of the calling context, if there is one.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

struct TokioHandle {
    status: Arc<Status>,
    token: CancellationToken,
}

impl ScheduledHandle for TokioHandle {
    fn cancel(&self) -> bool {
        let cancelled = self.status.cancel();
        if cancelled {
            self.token.cancel();
        }
        cancelled
    }

    fn is_cancelled(&self) -> bool {
        self.status.get() == CANCELLED
    }
}

impl ScheduledExecutor for TokioScheduledExecutor {
    fn schedule(&self, action: Action, delay: Duration) -> Arc<dyn ScheduledHandle> {
        let status = Arc::new(Status::default());
        let token = CancellationToken::new();

        let task_status = status.clone();
        let task_token = token.clone();
        self.handle.spawn(async move {
            tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    debug!("Scheduled action cancelled");
                }
                _ = tokio::time::sleep(delay) => {
                    if task_status.claim() {
                        let _ = tokio::task::spawn_blocking(action).await;
                    }
                }
            }
        });

        Arc::new(TokioHandle { status, token })
    }
}

struct ManualTask {
    delay: Duration,
    status: Status,
    action: Mutex<Option<Action>>,
}

impl ScheduledHandle for ManualTask {
    fn cancel(&self) -> bool {
        let cancelled = self.status.cancel();
        if cancelled {
            self.action.lock().take();
        }
        cancelled
    }

    fn is_cancelled(&self) -> bool {
        self.status.get() == CANCELLED
    }
}

/// Records scheduled actions so tests can run them on demand, in the
/// order they were scheduled, on the calling thread.
#[derive(Default)]
pub struct ManualExecutor {
    tasks: Mutex<Vec<Arc<ManualTask>>>,
}

impl ManualExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of actions neither run nor cancelled.
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|t| t.status.get() == PENDING)
            .count()
    }

    /// Delays of the pending actions, oldest first.
    pub fn delays(&self) -> Vec<Duration> {
        self.tasks
            .lock()
            .iter()
            .filter(|t| t.status.get() == PENDING)
            .map(|t| t.delay)
            .collect()
    }

    /// Run the oldest pending action. Returns false if there was none.
    pub fn run_next(&self) -> bool {
        let next = {
            let mut tasks = self.tasks.lock();
            tasks.retain(|t| t.status.get() == PENDING);
            tasks.iter().find(|t| t.status.claim()).cloned()
        };
        match next.and_then(|t| t.action.lock().take()) {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }
}

impl ScheduledExecutor for ManualExecutor {
    fn schedule(&self, action: Action, delay: Duration) -> Arc<dyn ScheduledHandle> {
        let task = Arc::new(ManualTask {
            delay,
            status: Status::default(),
            action: Mutex::new(Some(action)),
        });
        self.tasks.lock().push(task.clone());
        task
    }
}
