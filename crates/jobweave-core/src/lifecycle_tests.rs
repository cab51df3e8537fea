use super::*;
use std::sync::atomic::AtomicBool;

use crate::jobs::{FnJob, Outcome};
use jobweave_protocols::JobState;

struct TestHook {
    name: String,
    started: AtomicBool,
    stopped: AtomicBool,
    fail_start: bool,
    priority: i32,
}

impl TestHook {
    fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            fail_start: false,
            priority,
        }
    }

    fn failing(name: &str, priority: i32) -> Self {
        Self {
            fail_start: true,
            ..Self::new(name, priority)
        }
    }
}

#[async_trait::async_trait]
impl LifecycleHook for TestHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_start(&self) -> Result<(), LifecycleError> {
        if self.fail_start {
            return Err(LifecycleError::StartFailed {
                name: self.name.clone(),
                reason: "refused".to_string(),
            });
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), LifecycleError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[test]
fn test_state_conversion() {
    assert_eq!(LifecycleState::from(0), LifecycleState::Created);
    assert_eq!(LifecycleState::from(2), LifecycleState::Running);
    assert_eq!(LifecycleState::from(99), LifecycleState::Created);
}

#[test]
fn test_shutdown_signal() {
    let signal = ShutdownSignal::new();
    let mut rx = signal.subscribe();

    signal.trigger();

    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn test_lifecycle_start_stop() {
    let manager = LifecycleManager::default();
    let hook = Arc::new(TestHook::new("hook", 0));
    manager.register_hook(hook.clone()).await;

    assert_eq!(manager.state(), LifecycleState::Created);

    manager.start().await.unwrap();
    assert!(manager.is_running());
    assert!(hook.started.load(Ordering::SeqCst));

    manager.stop().await.unwrap();
    assert_eq!(manager.state(), LifecycleState::Stopped);
    assert!(hook.stopped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_cannot_start_twice() {
    let manager = LifecycleManager::default();
    manager.start().await.unwrap();

    let result = manager.start().await;
    assert!(matches!(
        result,
        Err(LifecycleError::InvalidState { operation: "start", .. })
    ));
}

#[tokio::test]
async fn test_failed_start_rolls_back() {
    let manager = LifecycleManager::default();
    let first = Arc::new(TestHook::new("first", 10));
    let second = Arc::new(TestHook::failing("second", 5));
    manager.register_hook(second.clone()).await;
    manager.register_hook(first.clone()).await;

    assert!(manager.start().await.is_err());

    assert!(first.started.load(Ordering::SeqCst));
    assert!(first.stopped.load(Ordering::SeqCst));
    assert_eq!(manager.state(), LifecycleState::Stopped);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_job_hook_runs_and_stops_job() {
    let job = Arc::new(FnJob::new("root", |ctx| {
        ctx.wait_for_stop(Duration::from_secs(10));
        Ok(Outcome::Incomplete)
    }));
    let manager = LifecycleManager::default();
    manager
        .register_hook(Arc::new(JobLifecycleHook::new(job.clone())))
        .await;

    manager.start().await.unwrap();
    while job.state() != JobState::Executing {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    manager.stop().await.unwrap();

    assert_eq!(job.state(), JobState::Incomplete);
}
