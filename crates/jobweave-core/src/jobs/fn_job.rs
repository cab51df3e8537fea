//! A simple job backed by a closure.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use jobweave_protocols::{Job, JobError, JobState, Resettable, Stateful, Stoppable};

use crate::conditions::StateCondition;
use crate::state_handler::StateHandler;
use crate::stop_wait::{wait_for_stop, DEFAULT_STOP_TIMEOUT};

/// How a job body finished when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Complete,
    Incomplete,
}

/// Handed to a job body so it can cooperate with `stop()`.
#[derive(Default)]
pub struct JobContext {
    stop: Mutex<bool>,
    signal: Condvar,
}

impl JobContext {
    pub fn is_stop_requested(&self) -> bool {
        *self.stop.lock()
    }

    /// Sleep for up to `timeout`, waking early on stop. Returns true if
    /// stop was requested.
    pub fn wait_for_stop(&self, timeout: Duration) -> bool {
        let mut stop = self.stop.lock();
        if !*stop {
            self.signal.wait_while_for(&mut stop, |s| !*s, timeout);
        }
        *stop
    }

    fn request_stop(&self) {
        *self.stop.lock() = true;
        self.signal.notify_all();
    }

    fn clear(&self) {
        *self.stop.lock() = false;
    }
}

type Body = Box<dyn Fn(&JobContext) -> Result<Outcome, JobError> + Send + Sync>;

/// A leaf job that runs a closure on the calling thread.
///
/// The closure's result becomes the job state: `COMPLETE`, `INCOMPLETE`,
/// or `EXCEPTION` for an error or a panic.
pub struct FnJob {
    name: String,
    handler: StateHandler<JobState>,
    context: JobContext,
    body: Body,
    stop_timeout: Duration,
}

impl FnJob {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&JobContext) -> Result<Outcome, JobError> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            handler: StateHandler::new(name.clone()),
            name,
            context: JobContext::default(),
            body: Box::new(body),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// A job that always completes.
    pub fn completing(name: impl Into<String>) -> Self {
        Self::new(name, |_| Ok(Outcome::Complete))
    }

    /// A job that always finishes incomplete.
    pub fn incomplete(name: impl Into<String>) -> Self {
        Self::new(name, |_| Ok(Outcome::Incomplete))
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn state(&self) -> JobState {
        self.handler.state()
    }

    pub fn handler(&self) -> &StateHandler<JobState> {
        &self.handler
    }

    /// Move to `DESTROYED`. Refused while running.
    pub fn destroy(&self) -> bool {
        let result = self.handler.wait_to_when(StateCondition::NotExecuting, || {
            self.handler.set_state(JobState::Destroyed);
            self.handler.fire_event();
        });
        result.unwrap_or_else(|e| {
            warn!(job = %self.name, "Destroy failed: {}", e);
            false
        })
    }

    fn reset(&self, condition: StateCondition, kind: &str) -> bool {
        let result = self.handler.wait_to_when(condition, || {
            self.context.clear();
            self.handler.set_state(JobState::Ready);
            self.handler.fire_event();
        });
        match result {
            Ok(true) => {
                debug!(job = %self.name, "{} reset", kind);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(job = %self.name, "{} reset failed: {}", kind, e);
                false
            }
        }
    }
}

impl Job for FnJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> Result<(), JobError> {
        let started = self.handler.wait_to_when(StateCondition::Executable, || {
            self.context.clear();
            self.handler.set_state(JobState::Executing);
            self.handler.fire_event();
        })?;
        if !started {
            warn!(job = %self.name, state = %self.handler.state(), "Not ready to run");
            return Ok(());
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| (self.body)(&self.context)));

        self.handler.wait_to_when(StateCondition::Any, || {
            match result {
                Ok(Ok(Outcome::Complete)) => self.handler.set_state(JobState::Complete),
                Ok(Ok(Outcome::Incomplete)) => self.handler.set_state(JobState::Incomplete),
                Ok(Err(e)) => {
                    warn!(job = %self.name, "Job failed: {}", e);
                    self.handler.set_state_exception(e);
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(job = %self.name, "Job panicked: {}", message);
                    self.handler
                        .set_state_exception(JobError::failed(format!("panicked: {}", message)));
                }
            }
            self.handler.fire_event();
        })?;
        info!(job = %self.name, state = %self.handler.state(), "Finished");
        Ok(())
    }

    fn as_stateful(&self) -> Option<&dyn Stateful> {
        Some(&self.handler)
    }

    fn as_stoppable(&self) -> Option<&dyn Stoppable> {
        Some(self)
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        Some(self)
    }
}

impl Stoppable for FnJob {
    fn stop(&self) -> Result<(), JobError> {
        let running = self
            .handler
            .wait_to_when(StateCondition::Stoppable, || self.context.request_stop())?;
        if running {
            debug!(job = %self.name, "Stop requested");
            wait_for_stop(&self.name, &self.handler, self.stop_timeout)?;
        }
        Ok(())
    }
}

impl Resettable for FnJob {
    fn soft_reset(&self) -> bool {
        self.reset(StateCondition::SoftResetable, "Soft")
    }

    fn hard_reset(&self) -> bool {
        self.reset(StateCondition::HardResetable, "Hard")
    }
}

impl fmt::Debug for FnJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnJob")
            .field("name", &self.name)
            .field("state", &self.handler.state())
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
