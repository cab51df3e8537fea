//! Aggregation of a dynamic child list into one parent state.
//!
//! Each child occupies a slot addressed by a token. The per-child listener
//! is a closure over a weak reference to the aggregator and that token, so
//! children never keep their parent alive.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use jobweave_protocols::{
    Job, JobState, ListenerId, ParentState, State, StateEvent, StateListener, Stateful,
    Structural, StructuralEvent, StructuralListener,
};

use crate::conditions::StateCondition;
use crate::operators::{StateOperator, WorstStateOp};
use crate::state_handler::StateHandler;

type Token = u64;

struct Slot {
    child: Arc<dyn Job>,
    state: Option<State>,
    listener: Option<ListenerId>,
}

#[derive(Default)]
struct Slots {
    next_token: Token,
    order: Vec<Token>,
    entries: HashMap<Token, Slot>,
}

impl Slots {
    fn states(&self) -> Vec<State> {
        self.order
            .iter()
            .filter_map(|t| self.entries.get(t).and_then(|s| s.state))
            .collect()
    }
}

struct Inner {
    handler: StateHandler<ParentState>,
    slots: Mutex<Slots>,
    operator: Mutex<Arc<dyn StateOperator>>,
}

/// Tracks the states of a parent's children and publishes their
/// aggregate as a [`ParentState`].
///
/// The aggregate is recomputed when a child is added or removed, when a
/// tracked child changes state and when the operator is replaced. An
/// event is fired only when the result differs from the last published
/// state. A child that is not [`Stateful`] counts as `COMPLETE`.
pub struct StateAggregator {
    inner: Arc<Inner>,
}

impl StateAggregator {
    pub fn new(source: impl Into<String>) -> Self {
        Self::with_operator(source, Arc::new(WorstStateOp))
    }

    pub fn with_operator(source: impl Into<String>, operator: Arc<dyn StateOperator>) -> Self {
        Self {
            inner: Arc::new(Inner {
                handler: StateHandler::new(source),
                slots: Mutex::new(Slots::default()),
                operator: Mutex::new(operator),
            }),
        }
    }

    /// Follow the children of a structural job. Existing children are
    /// added immediately.
    pub fn attach(&self, structural: &dyn Structural) -> ListenerId {
        structural.add_structural_listener(Arc::new(StructureFollower {
            inner: Arc::downgrade(&self.inner),
        }))
    }

    /// Stop following a structural job and drop every tracked child.
    pub fn detach(&self, structural: &dyn Structural, id: ListenerId) {
        structural.remove_structural_listener(id);
        self.inner.clear();
    }

    pub fn child_added(&self, index: usize, child: Arc<dyn Job>) {
        Inner::child_added(&self.inner, index, child);
    }

    pub fn child_removed(&self, index: usize) {
        self.inner.child_removed(index);
    }

    /// Replace the operator. Returns false if the new operator has the
    /// same name as the current one, in which case nothing changes.
    pub fn set_operator(&self, operator: Arc<dyn StateOperator>) -> bool {
        {
            let mut current = self.inner.operator.lock();
            if current.name() == operator.name() {
                return false;
            }
            debug!(source = %self.inner.handler.source(), operator = operator.name(), "Operator replaced");
            *current = operator;
        }
        self.inner.recompute();
        true
    }

    pub fn operator_name(&self) -> String {
        self.inner.operator.lock().name().to_string()
    }

    pub fn recompute(&self) {
        self.inner.recompute();
    }

    pub fn state(&self) -> ParentState {
        self.inner.handler.state()
    }

    /// Cached child states in position order. `None` for a child that has
    /// not published a state yet.
    pub fn child_states(&self) -> Vec<Option<State>> {
        let slots = self.inner.slots.lock();
        slots
            .order
            .iter()
            .map(|t| slots.entries.get(t).and_then(|s| s.state))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.slots.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every tracked child and recompute.
    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl Stateful for StateAggregator {
    fn add_state_listener(&self, listener: StateListener) -> ListenerId {
        self.inner.handler.add_state_listener(listener)
    }

    fn remove_state_listener(&self, id: ListenerId) {
        self.inner.handler.remove_state_listener(id);
    }

    fn last_state_event(&self) -> StateEvent {
        self.inner.handler.last_state_event()
    }
}

impl fmt::Debug for StateAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateAggregator")
            .field("source", &self.inner.handler.source())
            .field("state", &self.state())
            .field("children", &self.len())
            .finish()
    }
}

impl Inner {
    fn child_added(this: &Arc<Self>, index: usize, child: Arc<dyn Job>) {
        let stateful = child.as_stateful().is_some();
        let token = {
            let mut slots = this.slots.lock();
            let token = slots.next_token;
            slots.next_token += 1;
            let index = index.min(slots.order.len());
            slots.order.insert(index, token);
            slots.entries.insert(
                token,
                Slot {
                    child: child.clone(),
                    state: (!stateful).then_some(JobState::Complete.into()),
                    listener: None,
                },
            );
            token
        };

        // Subscribing delivers the child's current state, which only fills
        // the slot. The single recompute below covers the add.
        if let Some(target) = child.as_stateful() {
            let weak = Arc::downgrade(this);
            let listener: StateListener = Arc::new(move |event: &StateEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.child_state_changed(token, event.state);
                }
            });
            let id = target.add_state_listener(listener);
            let orphaned = {
                let mut slots = this.slots.lock();
                match slots.entries.get_mut(&token) {
                    Some(slot) => {
                        slot.listener = Some(id);
                        false
                    }
                    None => true,
                }
            };
            if orphaned {
                target.remove_state_listener(id);
            }
        }
        this.recompute();
    }

    fn child_removed(&self, index: usize) {
        let removed = {
            let mut slots = self.slots.lock();
            if index >= slots.order.len() {
                warn!(source = %self.handler.source(), index, "No child to remove at index");
                return;
            }
            let token = slots.order.remove(index);
            slots.entries.remove(&token)
        };
        if let Some(slot) = removed {
            unsubscribe(&slot);
        }
        self.recompute();
    }

    fn child_state_changed(&self, token: Token, state: State) {
        let changed = {
            let mut slots = self.slots.lock();
            match slots.entries.get_mut(&token) {
                Some(slot) => {
                    let previous = slot.state.replace(state);
                    previous.is_some_and(|p| p != state)
                }
                None => false,
            }
        };
        if changed {
            self.recompute();
        }
    }

    fn recompute(&self) {
        let result = self.handler.wait_to_when(StateCondition::Any, || {
            let states = self.slots.lock().states();
            let operator = self.operator.lock().clone();
            match operator.evaluate(&states) {
                Ok(next) if next != self.handler.state() => {
                    debug!(source = %self.handler.source(), state = %next, "Aggregate state changed");
                    self.handler.set_state(next);
                    self.handler.fire_event();
                }
                Ok(_) => {}
                Err(e) => {
                    error!(source = %self.handler.source(), "Failed to aggregate child states: {}", e);
                }
            }
        });
        if let Err(e) = result {
            error!(source = %self.handler.source(), "Aggregate state not recomputed: {}", e);
        }
    }

    fn clear(&self) {
        let removed: Vec<Slot> = {
            let mut slots = self.slots.lock();
            slots.order.clear();
            slots.entries.drain().map(|(_, slot)| slot).collect()
        };
        for slot in &removed {
            unsubscribe(slot);
        }
        self.recompute();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for slot in self.slots.get_mut().entries.values() {
            unsubscribe(slot);
        }
    }
}

fn unsubscribe(slot: &Slot) {
    if let (Some(id), Some(target)) = (slot.listener, slot.child.as_stateful()) {
        target.remove_state_listener(id);
    }
}

struct StructureFollower {
    inner: Weak<Inner>,
}

impl StructuralListener for StructureFollower {
    fn child_added(&self, event: &StructuralEvent) {
        if let Some(inner) = self.inner.upgrade() {
            Inner::child_added(&inner, event.index, event.child.clone());
        }
    }

    fn child_removed(&self, event: &StructuralEvent) {
        if let Some(inner) = self.inner.upgrade() {
            inner.child_removed(event.index);
        }
    }
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod tests;
