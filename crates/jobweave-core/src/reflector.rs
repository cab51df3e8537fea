//! Mirrors child state into the owning job's state.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use jobweave_protocols::{ListenerId, ParentState, StateEvent, Stateful};

use crate::conditions::StateCondition;
use crate::state_handler::StateHandler;

type Mapping = Arc<dyn Fn(ParentState) -> ParentState + Send + Sync>;

/// Once started, copies every state published by a source (usually a
/// [`crate::StateAggregator`]) into a target handler, optionally mapping it
/// first.
///
/// Call [`start`](Self::start) and [`stop`](Self::stop) without holding the
/// target's transition guard.
pub struct ChildStateReflector {
    target: Arc<StateHandler<ParentState>>,
    mapping: Option<Mapping>,
    subscription: Mutex<Option<ListenerId>>,
}

impl ChildStateReflector {
    pub fn new(target: Arc<StateHandler<ParentState>>) -> Self {
        Self {
            target,
            mapping: None,
            subscription: Mutex::new(None),
        }
    }

    pub fn with_mapping<F>(mut self, mapping: F) -> Self
    where
        F: Fn(ParentState) -> ParentState + Send + Sync + 'static,
    {
        self.mapping = Some(Arc::new(mapping));
        self
    }

    /// Start reflecting. The source's current state is applied at once.
    /// Starting twice is a no-op.
    pub fn start(&self, source: &dyn Stateful) {
        let mut subscription = self.subscription.lock();
        if subscription.is_some() {
            return;
        }
        let target = self.target.clone();
        let mapping = self.mapping.clone();
        let listener = Arc::new(move |event: &StateEvent| {
            let state = event.state.as_parent();
            let state = match &mapping {
                Some(map) => map(state),
                None => state,
            };
            reflect(&target, state);
        });
        *subscription = Some(source.add_state_listener(listener));
        debug!(target = %self.target.source(), "Reflecting child state");
    }

    /// Stop reflecting. Returns false if not started.
    pub fn stop(&self, source: &dyn Stateful) -> bool {
        match self.subscription.lock().take() {
            Some(id) => {
                source.remove_state_listener(id);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.subscription.lock().is_some()
    }
}

fn reflect(target: &StateHandler<ParentState>, state: ParentState) {
    let result = target.wait_to_when(StateCondition::Any, || {
        if target.state() != state {
            target.set_state(state);
            target.fire_event();
        }
    });
    if let Err(e) = result {
        error!(target = %target.source(), "Failed to reflect state {}: {}", state, e);
    }
}
