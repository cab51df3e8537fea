//! Runs one child per value, creating the children on demand.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use jobweave_protocols::{
    same_job, Job, JobError, ParentState, Resettable, Stateful, Stoppable, Structural,
};

use crate::conditions::StateCondition;
use crate::jobs::structural::StructuralBase;

/// A child created for one value, with the means to tear it down.
pub struct ChildHandle {
    job: Arc<dyn Job>,
    destroyer: Option<Box<dyn FnOnce() + Send>>,
}

impl ChildHandle {
    pub fn new(job: Arc<dyn Job>) -> Self {
        Self { job, destroyer: None }
    }

    pub fn with_destroyer<F>(mut self, destroyer: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.destroyer = Some(Box::new(destroyer));
        self
    }

    pub fn job(&self) -> &Arc<dyn Job> {
        &self.job
    }

    pub fn destroy(self) {
        if let Some(destroyer) = self.destroyer {
            destroyer();
        }
    }
}

/// Creates the child job for one value.
///
/// Returning `Ok(None)` skips the value.
pub trait ChildFactory: Send + Sync {
    fn create_child_for(&self, index: usize, value: &Value) -> Result<Option<ChildHandle>, JobError>;
}

impl<F> ChildFactory for F
where
    F: Fn(usize, &Value) -> Result<Option<ChildHandle>, JobError> + Send + Sync,
{
    fn create_child_for(&self, index: usize, value: &Value) -> Result<Option<ChildHandle>, JobError> {
        self(index, value)
    }
}

#[derive(Default)]
struct Progress {
    loaded: bool,
    next_value: usize,
    ready: VecDeque<Arc<dyn Job>>,
    complete: VecDeque<Arc<dyn Job>>,
    handles: Vec<ChildHandle>,
}

/// Runs a child for each value in turn, stopping at the first child that
/// does not complete.
///
/// With `pre_load` set only that many unrun children exist at a time. With
/// `purge_after` set, completed children beyond that number are removed and
/// destroyed. A hard reset destroys every child so the next run creates
/// them afresh.
pub struct ForEachJob {
    base: StructuralBase,
    values: Vec<Value>,
    factory: Arc<dyn ChildFactory>,
    pre_load: usize,
    purge_after: usize,
    progress: Mutex<Progress>,
}

impl ForEachJob {
    pub fn new(name: impl Into<String>, values: Vec<Value>, factory: Arc<dyn ChildFactory>) -> Self {
        Self {
            base: StructuralBase::new(name.into()),
            values,
            factory,
            pre_load: 0,
            purge_after: 0,
            progress: Mutex::new(Progress::default()),
        }
    }

    /// Keep at most this many unrun children loaded. Zero loads all.
    pub fn with_pre_load(mut self, pre_load: usize) -> Self {
        self.pre_load = pre_load;
        self
    }

    /// Destroy completed children beyond this many. Zero keeps all.
    pub fn with_purge_after(mut self, purge_after: usize) -> Self {
        self.purge_after = purge_after;
        self
    }

    pub fn state(&self) -> ParentState {
        self.base.handler.state()
    }

    pub fn children(&self) -> Vec<Arc<dyn Job>> {
        self.base.children.children()
    }

    /// Create the initial children without running them.
    pub fn load(&self) -> Result<(), JobError> {
        if !self.base.handler.wait_to_when(StateCondition::NotExecuting, || {})? {
            return Ok(());
        }
        self.pre_load_children()
    }

    pub fn is_loaded(&self) -> bool {
        self.progress.lock().loaded
    }

    fn pre_load_children(&self) -> Result<(), JobError> {
        {
            let mut progress = self.progress.lock();
            if progress.loaded {
                return Ok(());
            }
            progress.loaded = true;
        }
        debug!(job = %self.base.name, values = self.values.len(), "Creating children");
        self.load_next().map(|_| ())
    }

    /// Top up the ready queue. Returns false once every value is used.
    fn load_next(&self) -> Result<bool, JobError> {
        loop {
            let index = {
                let mut progress = self.progress.lock();
                if self.pre_load > 0 && progress.ready.len() >= self.pre_load {
                    return Ok(true);
                }
                if progress.next_value >= self.values.len() {
                    return Ok(false);
                }
                progress.next_value += 1;
                progress.next_value - 1
            };
            match self.factory.create_child_for(index, &self.values[index])? {
                Some(handle) => {
                    let job = handle.job().clone();
                    {
                        let mut progress = self.progress.lock();
                        progress.ready.push_back(job.clone());
                        progress.handles.push(handle);
                    }
                    self.base.children.add_child(job);
                }
                None => debug!(job = %self.base.name, index, "No child for value, skipping"),
            }
        }
    }

    fn remove(&self, child: &Arc<dyn Job>) {
        self.base.children.remove_child(child);
        let handle = {
            let mut progress = self.progress.lock();
            progress
                .handles
                .iter()
                .position(|h| same_job(h.job(), child))
                .map(|i| progress.handles.remove(i))
        };
        if let Some(handle) = handle {
            handle.destroy();
        }
    }

    fn execute(&self) -> Result<(), JobError> {
        self.pre_load_children()?;

        while !self.base.is_stop_requested() {
            self.load_next()?;

            loop {
                let purge = {
                    let mut progress = self.progress.lock();
                    if self.purge_after > 0 && progress.complete.len() > self.purge_after {
                        progress.complete.pop_front()
                    } else {
                        None
                    }
                };
                match purge {
                    Some(child) => self.remove(&child),
                    None => break,
                }
            }

            let Some(child) = self.progress.lock().ready.pop_front() else {
                break;
            };
            child.run()?;
            self.progress.lock().complete.push_back(child.clone());

            let completed = child
                .as_stateful()
                .is_none_or(|s| s.last_state_event().state.is_complete());
            if !completed {
                info!(job = %self.base.name, child = child.name(), "Child did not complete, can't continue");
                break;
            }
        }
        Ok(())
    }

    fn destroy_children(&self) {
        self.base.children.remove_all();
        let handles = std::mem::take(&mut *self.progress.lock()).handles;
        for handle in handles {
            handle.destroy();
        }
    }
}

impl Job for ForEachJob {
    fn name(&self) -> &str {
        &self.base.name
    }

    fn run(&self) -> Result<(), JobError> {
        if !self.base.begin()? {
            return Ok(());
        }
        if let Err(e) = self.execute() {
            return self.base.fail(e);
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

impl Stoppable for ForEachJob {
    fn stop(&self) -> Result<(), JobError> {
        self.base.stop()
    }
}

impl Resettable for ForEachJob {
    fn soft_reset(&self) -> bool {
        self.base.reset(StateCondition::SoftResetable, || {
            self.base.children.soft_reset_children();
            let mut progress = self.progress.lock();
            let mut ready: VecDeque<_> = progress.complete.drain(..).collect();
            ready.extend(progress.ready.drain(..));
            progress.ready = ready;
        })
    }

    fn hard_reset(&self) -> bool {
        self.base.reset(StateCondition::HardResetable, || {
            warn!(job = %self.base.name, "Destroying children");
            self.destroy_children();
        })
    }
}

impl Drop for ForEachJob {
    fn drop(&mut self) {
        self.destroy_children();
    }
}

impl fmt::Debug for ForEachJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForEachJob")
            .field("name", &self.base.name)
            .field("state", &self.state())
            .field("values", &self.values.len())
            .finish()
    }
}
