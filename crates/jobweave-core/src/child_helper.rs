//! Ordered child list of a structural job.

use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, warn};

use jobweave_protocols::{
    same_job, Job, JobError, ListenerId, Structural, StructuralEvent, StructuralListener,
};

use crate::listeners::ListenerRegistry;

/// Owns the ordered children of a structural job and notifies structural
/// listeners of every insert and removal.
///
/// Mutations and their notifications are serialised under one guard, so
/// listeners observe positions exactly as they were when the change was
/// made.
pub struct ChildHelper {
    source: String,
    guard: ReentrantMutex<()>,
    children: Mutex<Vec<Arc<dyn Job>>>,
    listeners: ListenerRegistry<dyn StructuralListener>,
}

impl ChildHelper {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            guard: ReentrantMutex::new(()),
            children: Mutex::new(Vec::new()),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Insert a child. An index past the end appends.
    pub fn insert_child(&self, index: usize, child: Arc<dyn Job>) -> usize {
        let _guard = self.guard.lock();
        let index = {
            let mut children = self.children.lock();
            let index = index.min(children.len());
            children.insert(index, child.clone());
            index
        };
        debug!(parent = %self.source, child = child.name(), index, "Child added");
        let event = self.event(child, index);
        for listener in self.listeners.snapshot() {
            listener.child_added(&event);
        }
        index
    }

    /// Append a child, returning its position.
    pub fn add_child(&self, child: Arc<dyn Job>) -> usize {
        self.insert_child(usize::MAX, child)
    }

    /// Remove the child at `index`.
    pub fn remove_child_at(&self, index: usize) -> Option<Arc<dyn Job>> {
        let _guard = self.guard.lock();
        let child = {
            let mut children = self.children.lock();
            if index >= children.len() {
                return None;
            }
            children.remove(index)
        };
        debug!(parent = %self.source, child = child.name(), index, "Child removed");
        let event = self.event(child.clone(), index);
        for listener in self.listeners.snapshot() {
            listener.child_removed(&event);
        }
        Some(child)
    }

    /// Remove a child by identity, returning its former position.
    pub fn remove_child(&self, child: &Arc<dyn Job>) -> Option<usize> {
        let _guard = self.guard.lock();
        let index = self.index_of(child)?;
        self.remove_child_at(index).map(|_| index)
    }

    /// Remove every child, last first.
    pub fn remove_all(&self) -> Vec<Arc<dyn Job>> {
        let _guard = self.guard.lock();
        let mut removed = Vec::new();
        while let Some(last) = self.len().checked_sub(1) {
            if let Some(child) = self.remove_child_at(last) {
                removed.push(child);
            }
        }
        removed.reverse();
        removed
    }

    pub fn index_of(&self, child: &Arc<dyn Job>) -> Option<usize> {
        self.children.lock().iter().position(|c| same_job(c, child))
    }

    /// The first child, for single-child jobs.
    pub fn child(&self) -> Option<Arc<dyn Job>> {
        self.children.lock().first().cloned()
    }

    pub fn child_at(&self, index: usize) -> Option<Arc<dyn Job>> {
        self.children.lock().get(index).cloned()
    }

    pub fn children(&self) -> Vec<Arc<dyn Job>> {
        self.children.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.children.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.lock().is_empty()
    }

    pub fn has_no_listeners(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Stop every stoppable child, last first. All children are asked to
    /// stop even if one fails; the first failure is returned.
    pub fn stop_children(&self) -> Result<(), JobError> {
        let mut first_error = None;
        for child in self.children().iter().rev() {
            if let Some(stoppable) = child.as_stoppable() {
                if let Err(e) = stoppable.stop() {
                    warn!(parent = %self.source, child = child.name(), "Failed to stop child: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn soft_reset_children(&self) {
        for child in self.children() {
            if let Some(resettable) = child.as_resettable() {
                resettable.soft_reset();
            }
        }
    }

    pub fn hard_reset_children(&self) {
        for child in self.children() {
            if let Some(resettable) = child.as_resettable() {
                resettable.hard_reset();
            }
        }
    }

    fn event(&self, child: Arc<dyn Job>, index: usize) -> StructuralEvent {
        StructuralEvent {
            source: self.source.clone(),
            child,
            index,
        }
    }
}

impl Structural for ChildHelper {
    fn add_structural_listener(&self, listener: Arc<dyn StructuralListener>) -> ListenerId {
        let _guard = self.guard.lock();
        let id = self.listeners.add(listener.clone());
        for (index, child) in self.children().into_iter().enumerate() {
            listener.child_added(&self.event(child, index));
        }
        id
    }

    fn remove_structural_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}
