//! Shared plumbing for jobs that run a list of children.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use jobweave_protocols::{JobError, ParentState};

use crate::aggregator::StateAggregator;
use crate::child_helper::ChildHelper;
use crate::conditions::StateCondition;
use crate::reflector::ChildStateReflector;
use crate::state_handler::StateHandler;
use crate::stop_wait::{wait_for_stop, DEFAULT_STOP_TIMEOUT};

/// State, children and child aggregation of a structural job.
///
/// While the job executes its own state is `EXECUTING`. Once execution
/// finishes the job reflects the aggregate of its children until reset.
pub(crate) struct StructuralBase {
    pub(crate) name: String,
    pub(crate) handler: Arc<StateHandler<ParentState>>,
    pub(crate) children: ChildHelper,
    pub(crate) aggregator: StateAggregator,
    reflector: ChildStateReflector,
    stop_requested: AtomicBool,
    pub(crate) stop_timeout: Duration,
}

impl StructuralBase {
    pub(crate) fn new(name: String) -> Self {
        let handler = Arc::new(StateHandler::new(name.clone()));
        let children = ChildHelper::new(name.clone());
        let aggregator = StateAggregator::new(name.clone());
        aggregator.attach(&children);
        Self {
            reflector: ChildStateReflector::new(handler.clone()),
            name,
            handler,
            children,
            aggregator,
            stop_requested: AtomicBool::new(false),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Move from `READY` to `EXECUTING`. Returns false if not ready.
    pub(crate) fn begin(&self) -> Result<bool, JobError> {
        let started = self.handler.wait_to_when(StateCondition::Executable, || {
            self.stop_requested.store(false, Ordering::SeqCst);
            self.handler.set_state(ParentState::Executing);
            self.handler.fire_event();
        })?;
        if !started {
            warn!(job = %self.name, state = %self.handler.state(), "Not ready to run");
        }
        Ok(started)
    }

    /// Hand the job's state over to its children.
    pub(crate) fn finish(&self) {
        self.reflector.start(&self.aggregator);
    }

    pub(crate) fn fail(&self, error: JobError) -> Result<(), JobError> {
        warn!(job = %self.name, "Failed: {}", error);
        self.handler.wait_to_when(StateCondition::Any, || {
            self.handler.set_state_exception(error);
            self.handler.fire_event();
        })?;
        Ok(())
    }

    pub(crate) fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub(crate) fn stop(&self) -> Result<(), JobError> {
        if !StateCondition::Stoppable.test(self.handler.state().into()) {
            return Ok(());
        }
        debug!(job = %self.name, "Stopping");
        self.stop_requested.store(true, Ordering::SeqCst);
        self.children.stop_children()?;
        wait_for_stop(&self.name, self.handler.as_ref(), self.stop_timeout)
    }

    /// Reset if `condition` holds, then return to `READY`. Children are
    /// reset outside the transition guard.
    pub(crate) fn reset<F>(&self, condition: StateCondition, reset_children: F) -> bool
    where
        F: FnOnce(),
    {
        let result = self
            .handler
            .wait_to_when(condition, || {
                self.reflector.stop(&self.aggregator);
            })
            .and_then(|allowed| {
                if allowed {
                    reset_children();
                    self.handler.change_state(ParentState::Ready)?;
                }
                Ok(allowed)
            });
        match result {
            Ok(done) => done,
            Err(e) => {
                warn!(job = %self.name, "Reset failed: {}", e);
                false
            }
        }
    }
}
