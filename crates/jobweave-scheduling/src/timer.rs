//! Timer: runs its child each time a schedule comes due.

use chrono::{DateTime, Utc};
use jobweave_protocols::{Resettable, State};

use crate::driver::{SchedulePolicy, ScheduleDriver};
use crate::interval::ScheduleResult;

/// A [`ScheduleDriver`] that hard resets its child before every run and
/// carries on scheduling whatever the child's outcome, unless told to
/// halt on failure.
pub type Timer = ScheduleDriver<TimerPolicy>;

#[derive(Debug, Clone, Copy, Default)]
pub struct TimerPolicy {
    /// Reschedule from now when the next occurrence is already past.
    pub skip_missed_runs: bool,
    /// Stop scheduling the first time the child does not complete.
    pub halt_on_failure: bool,
}

impl TimerPolicy {
    pub fn skip_missed_runs(mut self, skip: bool) -> Self {
        self.skip_missed_runs = skip;
        self
    }

    pub fn halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }
}

impl SchedulePolicy for TimerPolicy {
    fn kind(&self) -> &'static str {
        "timer"
    }

    fn reset_child(&self, child: &dyn Resettable) {
        child.hard_reset();
    }

    fn reschedule_on(
        &self,
        state: State,
        current: Option<&ScheduleResult>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if self.halt_on_failure && !state.is_complete() {
            return None;
        }
        let next = current?.use_next?;
        if self.skip_missed_runs && next < now {
            Some(now)
        } else {
            Some(next)
        }
    }
}

impl Timer {
    pub fn timer(name: impl Into<String>) -> Self {
        Self::new(name, TimerPolicy::default())
    }
}
