//! Job capability traits.
//!
//! A [`Job`] exposes its optional capabilities through the `as_*`
//! accessors, so containers can ask a child whether it publishes state,
//! has children, can be stopped or can be reset.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::JobError;
use crate::event::{ListenerId, StateEvent, StateListener, StructuralListener};

/// Anything that can be run.
pub trait Job: Send + Sync {
    /// Display name, also used as the source of state events.
    fn name(&self) -> &str;

    /// Run the job on the calling thread.
    ///
    /// A stateful job records failures as its own state; the returned
    /// error is for failures the job could not record itself.
    fn run(&self) -> Result<(), JobError>;

    fn as_stateful(&self) -> Option<&dyn Stateful> {
        None
    }

    fn as_structural(&self) -> Option<&dyn Structural> {
        None
    }

    fn as_stoppable(&self) -> Option<&dyn Stoppable> {
        None
    }

    fn as_resettable(&self) -> Option<&dyn Resettable> {
        None
    }

    fn as_describable(&self) -> Option<&dyn Describable> {
        None
    }

    fn as_log_enabled(&self) -> Option<&dyn LogEnabled> {
        None
    }
}

/// Publishes state transitions.
pub trait Stateful: Send + Sync {
    /// Register a listener. The listener immediately receives the last
    /// event, then every subsequent one.
    fn add_state_listener(&self, listener: StateListener) -> ListenerId;

    fn remove_state_listener(&self, id: ListenerId);

    fn last_state_event(&self) -> StateEvent;
}

/// Has a dynamic, ordered list of children.
pub trait Structural: Send + Sync {
    /// Register a listener. The listener immediately receives a
    /// `child_added` for every existing child.
    fn add_structural_listener(&self, listener: Arc<dyn StructuralListener>) -> ListenerId;

    fn remove_structural_listener(&self, id: ListenerId);
}

/// Can be asked to stop.
pub trait Stoppable: Send + Sync {
    fn stop(&self) -> Result<(), JobError>;
}

/// Can be returned to a runnable condition.
pub trait Resettable: Send + Sync {
    /// Reset, keeping accumulated state such as counters. Returns false if
    /// the job was not in a soft-resettable state.
    fn soft_reset(&self) -> bool;

    /// Reset everything. Returns false if the job was not in a
    /// hard-resettable state.
    fn hard_reset(&self) -> bool;
}

/// Reports its properties for display, as name/value text.
pub trait Describable: Send + Sync {
    fn describe(&self) -> BTreeMap<String, String>;
}

/// Names the log target its output is written under.
pub trait LogEnabled: Send + Sync {
    fn logger_name(&self) -> String;
}

/// Compare two jobs by identity.
pub fn same_job(a: &Arc<dyn Job>, b: &Arc<dyn Job>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
