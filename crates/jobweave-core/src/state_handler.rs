//! The per-entity transition guard.
//!
//! Every mutation of a job's published state goes through
//! [`StateHandler::wait_to_when`] or [`StateHandler::try_to_when`]: the
//! caller names a [`StateCondition`], the handler takes its exclusive
//! (re-entrant) guard, checks the condition and runs the action while the
//! guard is held. Listeners are notified from [`StateHandler::fire_event`]
//! with the guard still held so they always see a consistent entity.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, error, warn};

use jobweave_protocols::{
    JobError, JobState, ListenerId, ParentState, State, StateEvent, StateListener,
    StateLockError, Stateful,
};

use crate::conditions::StateCondition;
use crate::interrupt;
use crate::listeners::ListenerRegistry;

/// Process-wide default lock timeout in milliseconds. Zero means unbounded.
static DEFAULT_LOCK_TIMEOUT_MS: AtomicU64 = AtomicU64::new(0);

/// How often a blocked waiter re-checks its interrupt flag.
const POLL_SLICE: Duration = Duration::from_millis(20);

/// Set the lock timeout used by handlers created from now on.
pub fn set_default_lock_timeout(timeout: Option<Duration>) {
    let ms = timeout.map(|t| t.as_millis().max(1) as u64).unwrap_or(0);
    DEFAULT_LOCK_TIMEOUT_MS.store(ms, Ordering::SeqCst);
}

/// The lock timeout used by new handlers, `None` if unbounded.
pub fn default_lock_timeout() -> Option<Duration> {
    match DEFAULT_LOCK_TIMEOUT_MS.load(Ordering::SeqCst) {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    }
}

/// A state lattice a [`StateHandler`] can manage.
pub trait LatticeState:
    Copy + PartialEq + Into<State> + fmt::Display + fmt::Debug + Send + Sync + 'static
{
    const READY: Self;
    const EXCEPTION: Self;
    const DESTROYED: Self;
}

impl LatticeState for JobState {
    const READY: Self = JobState::Ready;
    const EXCEPTION: Self = JobState::Exception;
    const DESTROYED: Self = JobState::Destroyed;
}

impl LatticeState for ParentState {
    const READY: Self = ParentState::Ready;
    const EXCEPTION: Self = ParentState::Exception;
    const DESTROYED: Self = ParentState::Destroyed;
}

struct Current<S> {
    state: S,
    last_event: StateEvent,
}

/// Holds an entity's state, its listeners and its transition guard.
pub struct StateHandler<S: LatticeState> {
    source: String,
    guard: ReentrantMutex<()>,
    current: Mutex<Current<S>>,
    listeners: ListenerRegistry<dyn Fn(&StateEvent) + Send + Sync>,
    lock_timeout: Option<Duration>,
}

impl<S: LatticeState> StateHandler<S> {
    /// Create a handler in the `READY` state.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let last_event = StateEvent::new(source.clone(), S::READY);
        Self {
            source,
            guard: ReentrantMutex::new(()),
            current: Mutex::new(Current {
                state: S::READY,
                last_event,
            }),
            listeners: ListenerRegistry::new(),
            lock_timeout: default_lock_timeout(),
        }
    }

    /// Override the lock timeout for this handler.
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn state(&self) -> S {
        self.current.lock().state
    }

    pub fn last_state_event(&self) -> StateEvent {
        self.current.lock().last_event.clone()
    }

    /// Wait for the guard, then run `action` if `condition` holds.
    ///
    /// Returns `Ok(false)` without running the action when the condition
    /// does not hold.
    pub fn wait_to_when<F>(&self, condition: StateCondition, action: F) -> Result<bool, StateLockError>
    where
        F: FnOnce(),
    {
        let _guard = self.acquire()?;
        Ok(self.run_if(condition, action))
    }

    /// Like [`Self::wait_to_when`] but fails with `Locked` instead of
    /// waiting when another thread holds the guard.
    pub fn try_to_when<F>(&self, condition: StateCondition, action: F) -> Result<bool, StateLockError>
    where
        F: FnOnce(),
    {
        let _guard = self.guard.try_lock().ok_or(StateLockError::Locked)?;
        Ok(self.run_if(condition, action))
    }

    /// Run `f` while holding the guard.
    pub fn call_locked<T, F>(&self, f: F) -> Result<T, StateLockError>
    where
        F: FnOnce() -> T,
    {
        let _guard = self.acquire()?;
        Ok(f())
    }

    /// Whether the calling thread holds the guard.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.guard.is_owned_by_current_thread()
    }

    /// Change the state. Call with the guard held, then [`Self::fire_event`].
    pub fn set_state(&self, state: S) {
        debug_assert!(self.is_held_by_current_thread());
        let mut current = self.current.lock();
        current.state = state;
        current.last_event = StateEvent::new(self.source.clone(), state);
    }

    /// Move to the exception state recording `error`. Call with the guard
    /// held, then [`Self::fire_event`].
    pub fn set_state_exception(&self, error: JobError) {
        debug_assert!(self.is_held_by_current_thread());
        let mut current = self.current.lock();
        current.state = S::EXCEPTION;
        current.last_event =
            StateEvent::with_exception(self.source.clone(), S::EXCEPTION, Arc::new(error));
    }

    /// Notify listeners of the last event. Call with the guard held.
    ///
    /// A panicking listener is logged and skipped; it never prevents the
    /// remaining listeners from being notified.
    pub fn fire_event(&self) {
        debug_assert!(self.is_held_by_current_thread());
        let event = self.last_state_event();
        debug!(source = %self.source, state = %event.state, "Firing state event");
        for listener in self.listeners.snapshot() {
            notify(&listener, &event, &self.source);
        }
    }

    /// Change the state and notify, taking the guard unconditionally.
    pub fn change_state(&self, state: S) -> Result<(), StateLockError> {
        self.wait_to_when(StateCondition::Any, || {
            self.set_state(state);
            self.fire_event();
        })
        .map(|_| ())
    }

    /// Register a listener and deliver the last event to it, waiting for
    /// the guard like [`Self::wait_to_when`] so no event can slip in
    /// between. Fails without registering on timeout or interrupt.
    pub fn try_add_state_listener(&self, listener: StateListener) -> Result<ListenerId, StateLockError> {
        let _guard = self.acquire()?;
        let id = self.listeners.add(listener.clone());
        notify(&listener, &self.last_state_event(), &self.source);
        Ok(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn run_if<F: FnOnce()>(&self, condition: StateCondition, action: F) -> bool {
        if condition.test(self.state().into()) {
            action();
            true
        } else {
            false
        }
    }

    fn acquire(&self) -> Result<ReentrantMutexGuard<'_, ()>, StateLockError> {
        if interrupt::is_interrupted() {
            return Err(StateLockError::Interrupted);
        }
        let deadline = self.lock_timeout.map(|t| (Instant::now() + t, t));
        loop {
            let slice = match deadline {
                Some((at, timeout)) => {
                    let now = Instant::now();
                    if now >= at {
                        return Err(StateLockError::Timeout(timeout));
                    }
                    (at - now).min(POLL_SLICE)
                }
                None => POLL_SLICE,
            };
            if let Some(guard) = self.guard.try_lock_for(slice) {
                return Ok(guard);
            }
            if interrupt::is_interrupted() {
                return Err(StateLockError::Interrupted);
            }
        }
    }
}

fn notify(listener: &StateListener, event: &StateEvent, source: &str) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
    if result.is_err() {
        error!(source = %source, "State listener panicked, ignoring");
    }
}

impl<S: LatticeState> Stateful for StateHandler<S> {
    /// Falls back to registering without the guard when it can not be
    /// had, so the listener is never lost. It may then see an event twice.
    fn add_state_listener(&self, listener: StateListener) -> ListenerId {
        match self.try_add_state_listener(listener.clone()) {
            Ok(id) => id,
            Err(e) => {
                warn!(source = %self.source, "Adding state listener unguarded: {}", e);
                let id = self.listeners.add(listener.clone());
                notify(&listener, &self.last_state_event(), &self.source);
                id
            }
        }
    }

    fn remove_state_listener(&self, id: ListenerId) {
        self.listeners.remove(id);
    }

    fn last_state_event(&self) -> StateEvent {
        StateHandler::last_state_event(self)
    }
}

impl<S: LatticeState> fmt::Debug for StateHandler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHandler")
            .field("source", &self.source)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
#[path = "state_handler_tests.rs"]
mod tests;
