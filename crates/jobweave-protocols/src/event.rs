//! State and structural events plus listener types.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::JobError;
use crate::job::Job;
use crate::state::State;

/// Identifies a registered listener so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// An immutable record of one state transition.
#[derive(Debug, Clone)]
pub struct StateEvent {
    /// Name of the job that fired the event.
    pub source: String,
    pub state: State,
    pub time: DateTime<Utc>,
    pub exception: Option<Arc<JobError>>,
}

impl StateEvent {
    /// Create an event stamped with the current time.
    pub fn new(source: impl Into<String>, state: impl Into<State>) -> Self {
        Self {
            source: source.into(),
            state: state.into(),
            time: Utc::now(),
            exception: None,
        }
    }

    /// Create an event carrying a failure.
    pub fn with_exception(
        source: impl Into<String>,
        state: impl Into<State>,
        exception: Arc<JobError>,
    ) -> Self {
        Self {
            exception: Some(exception),
            ..Self::new(source, state)
        }
    }

    /// Set the event time.
    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }
}

/// Callback invoked for every state event of a [`crate::Stateful`].
pub type StateListener = Arc<dyn Fn(&StateEvent) + Send + Sync>;

/// A child was added to or removed from a structural job.
#[derive(Clone)]
pub struct StructuralEvent {
    pub source: String,
    pub child: Arc<dyn Job>,
    pub index: usize,
}

impl fmt::Debug for StructuralEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuralEvent")
            .field("source", &self.source)
            .field("child", &self.child.name())
            .field("index", &self.index)
            .finish()
    }
}

/// Receives structural changes of a [`crate::Structural`].
pub trait StructuralListener: Send + Sync {
    fn child_added(&self, event: &StructuralEvent);

    fn child_removed(&self, event: &StructuralEvent);
}
