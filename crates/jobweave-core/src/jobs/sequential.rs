//! Runs children one after another.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use jobweave_protocols::{
    Job, JobError, JobState, ParentState, Resettable, State, Stateful, Stoppable, Structural,
};

use crate::conditions::StateCondition;
use crate::jobs::structural::StructuralBase;

/// Runs its children in order on the calling thread, stopping at the first
/// child that does not complete. Afterwards it reflects the worst state of
/// its children.
pub struct SequentialJob {
    base: StructuralBase,
}

impl SequentialJob {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: StructuralBase::new(name.into()),
        }
    }

    pub fn with_children(name: impl Into<String>, children: Vec<Arc<dyn Job>>) -> Self {
        let job = Self::new(name);
        for child in children {
            job.add_child(child);
        }
        job
    }

    pub fn add_child(&self, child: Arc<dyn Job>) -> usize {
        self.base.children.add_child(child)
    }

    pub fn insert_child(&self, index: usize, child: Arc<dyn Job>) -> usize {
        self.base.children.insert_child(index, child)
    }

    pub fn remove_child_at(&self, index: usize) -> Option<Arc<dyn Job>> {
        self.base.children.remove_child_at(index)
    }

    pub fn children(&self) -> Vec<Arc<dyn Job>> {
        self.base.children.children()
    }

    pub fn state(&self) -> ParentState {
        self.base.handler.state()
    }
}

impl Job for SequentialJob {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn run(&self) -> Result<(), JobError> {
        if !self.base.begin()? {
            return Ok(());
        }

        for child in self.base.children.children() {
            if self.base.is_stop_requested() {
                debug!(job = %self.base.name, "Stop requested, not running further children");
                break;
            }
            if let Err(e) = child.run() {
                return self.base.fail(e);
            }
            let state = child
                .as_stateful()
                .map(|s| s.last_state_event().state)
                .unwrap_or(State::Job(JobState::Complete));
            if !state.is_complete() {
                info!(job = %self.base.name, child = child.name(), state = %state, "Child did not complete, stopping sequence");
                break;
            }
        }

        self.base.finish();
        Ok(())
    }

    fn as_stateful(&self) -> Option<&dyn Stateful> {
        Some(self.base.handler.as_ref())
    }

    fn as_structural(&self) -> Option<&dyn Structural> {
        Some(&self.base.children)
    }

    fn as_stoppable(&self) -> Option<&dyn Stoppable> {
        Some(self)
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        Some(self)
    }
}

impl Stoppable for SequentialJob {
    fn stop(&self) -> Result<(), JobError> {
        self.base.stop()
    }
}

impl Resettable for SequentialJob {
    fn soft_reset(&self) -> bool {
        self.base.reset(StateCondition::SoftResetable, || {
            self.base.children.soft_reset_children()
        })
    }

    fn hard_reset(&self) -> bool {
        self.base.reset(StateCondition::HardResetable, || {
            self.base.children.hard_reset_children()
        })
    }
}

impl fmt::Debug for SequentialJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialJob")
            .field("name", &self.base.name)
            .field("state", &self.state())
            .field("children", &self.base.children.len())
            .finish()
    }
}
