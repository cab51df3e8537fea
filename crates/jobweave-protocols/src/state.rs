//! The state lattice.
//!
//! Simple jobs move through [`JobState`]; composite jobs through
//! [`ParentState`]. [`State`] unifies both so a parent can aggregate
//! children of either kind.

use std::fmt;

use serde::{Deserialize, Serialize};

/// States of a simple (leaf) job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Ready,
    Executing,
    Complete,
    Incomplete,
    Exception,
    Destroyed,
}

/// States of a composite (parent) job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParentState {
    Ready,
    /// The parent itself is executing.
    Executing,
    /// Children are still running.
    Active,
    /// Children have started and are running as services; nothing failed.
    Started,
    Complete,
    Incomplete,
    Exception,
    Destroyed,
}

/// Any state of any job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "lowercase")]
pub enum State {
    Job(JobState),
    Parent(ParentState),
}

impl JobState {
    pub fn is_ready(self) -> bool {
        self == JobState::Ready
    }

    pub fn is_executing(self) -> bool {
        self == JobState::Executing
    }

    pub fn is_stoppable(self) -> bool {
        self == JobState::Executing
    }

    pub fn is_complete(self) -> bool {
        self == JobState::Complete
    }

    pub fn is_incomplete(self) -> bool {
        self == JobState::Incomplete
    }

    pub fn is_exception(self) -> bool {
        self == JobState::Exception
    }

    pub fn is_destroyed(self) -> bool {
        self == JobState::Destroyed
    }
}

impl ParentState {
    pub fn is_ready(self) -> bool {
        self == ParentState::Ready
    }

    pub fn is_executing(self) -> bool {
        self == ParentState::Executing
    }

    pub fn is_stoppable(self) -> bool {
        matches!(
            self,
            ParentState::Executing | ParentState::Active | ParentState::Started
        )
    }

    /// `Started` counts as complete: the parent finished its own work and
    /// nothing failed, but children remain running.
    pub fn is_complete(self) -> bool {
        matches!(self, ParentState::Complete | ParentState::Started)
    }

    pub fn is_incomplete(self) -> bool {
        self == ParentState::Incomplete
    }

    pub fn is_exception(self) -> bool {
        self == ParentState::Exception
    }

    pub fn is_destroyed(self) -> bool {
        self == ParentState::Destroyed
    }

    /// Severity rank used for worst-of aggregation. Higher is worse.
    ///
    /// `Executing` and `Active` share a rank because an aggregate never
    /// reports `Executing` for its children.
    pub fn severity(self) -> u8 {
        match self {
            ParentState::Complete => 0,
            ParentState::Ready => 1,
            ParentState::Started => 2,
            ParentState::Executing | ParentState::Active => 3,
            ParentState::Incomplete => 4,
            ParentState::Exception => 5,
            ParentState::Destroyed => 6,
        }
    }
}

impl State {
    pub fn is_ready(self) -> bool {
        match self {
            State::Job(s) => s.is_ready(),
            State::Parent(s) => s.is_ready(),
        }
    }

    pub fn is_executing(self) -> bool {
        match self {
            State::Job(s) => s.is_executing(),
            State::Parent(s) => s.is_executing(),
        }
    }

    pub fn is_stoppable(self) -> bool {
        match self {
            State::Job(s) => s.is_stoppable(),
            State::Parent(s) => s.is_stoppable(),
        }
    }

    pub fn is_complete(self) -> bool {
        match self {
            State::Job(s) => s.is_complete(),
            State::Parent(s) => s.is_complete(),
        }
    }

    pub fn is_incomplete(self) -> bool {
        match self {
            State::Job(s) => s.is_incomplete(),
            State::Parent(s) => s.is_incomplete(),
        }
    }

    pub fn is_exception(self) -> bool {
        match self {
            State::Job(s) => s.is_exception(),
            State::Parent(s) => s.is_exception(),
        }
    }

    pub fn is_destroyed(self) -> bool {
        match self {
            State::Job(s) => s.is_destroyed(),
            State::Parent(s) => s.is_destroyed(),
        }
    }

    /// Finished in a way that will not change without a reset.
    pub fn is_terminal(self) -> bool {
        !self.is_ready() && !self.is_stoppable()
    }

    /// Project any state onto the parent lattice as seen by an aggregating
    /// parent. A running leaf job shows as `Active` to its parent.
    pub fn as_parent(self) -> ParentState {
        match self {
            State::Job(JobState::Ready) => ParentState::Ready,
            State::Job(JobState::Executing) => ParentState::Active,
            State::Job(JobState::Complete) => ParentState::Complete,
            State::Job(JobState::Incomplete) => ParentState::Incomplete,
            State::Job(JobState::Exception) => ParentState::Exception,
            State::Job(JobState::Destroyed) => ParentState::Destroyed,
            State::Parent(ParentState::Executing) => ParentState::Active,
            State::Parent(s) => s,
        }
    }
}

impl From<JobState> for State {
    fn from(state: JobState) -> Self {
        State::Job(state)
    }
}

impl From<ParentState> for State {
    fn from(state: ParentState) -> Self {
        State::Parent(state)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Ready => "READY",
            JobState::Executing => "EXECUTING",
            JobState::Complete => "COMPLETE",
            JobState::Incomplete => "INCOMPLETE",
            JobState::Exception => "EXCEPTION",
            JobState::Destroyed => "DESTROYED",
        };
        f.write_str(s)
    }
}

impl fmt::Display for ParentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParentState::Ready => "READY",
            ParentState::Executing => "EXECUTING",
            ParentState::Active => "ACTIVE",
            ParentState::Started => "STARTED",
            ParentState::Complete => "COMPLETE",
            ParentState::Incomplete => "INCOMPLETE",
            ParentState::Exception => "EXCEPTION",
            ParentState::Destroyed => "DESTROYED",
        };
        f.write_str(s)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Job(s) => s.fmt(f),
            State::Parent(s) => s.fmt(f),
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
