//! Retry: runs its child until it completes or the schedule runs out.

use chrono::{DateTime, Utc};
use jobweave_protocols::{Resettable, State};

use crate::driver::{SchedulePolicy, ScheduleDriver};
use crate::interval::{Interval, ScheduleResult};

/// A [`ScheduleDriver`] that soft resets its child between attempts, so
/// the child keeps anything it accumulated, and finishes as soon as the
/// child completes.
pub type Retry = ScheduleDriver<RetryPolicy>;

#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy {
    /// Attempts are only scheduled inside these limits.
    pub limits: Option<Interval>,
}

impl RetryPolicy {
    pub fn with_limits(limits: Interval) -> Self {
        Self { limits: Some(limits) }
    }
}

impl SchedulePolicy for RetryPolicy {
    fn kind(&self) -> &'static str {
        "retry"
    }

    fn limits(&self) -> Option<Interval> {
        self.limits
    }

    fn reset_child(&self, child: &dyn Resettable) {
        child.soft_reset();
    }

    fn reschedule_on(
        &self,
        state: State,
        current: Option<&ScheduleResult>,
        _now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if state.is_complete() {
            return None;
        }
        current?.use_next
    }
}

impl Retry {
    pub fn retry(name: impl Into<String>) -> Self {
        Self::new(name, RetryPolicy::default())
    }

    /// Attempts made since the last reset.
    pub fn attempts(&self) -> u64 {
        self.executions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use jobweave_protocols::JobState;

    #[test]
    fn test_finishes_on_complete() {
        let nine = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let ten = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let current = ScheduleResult::continuing(Interval::new(nine, ten).unwrap());
        let policy = RetryPolicy::default();

        assert_eq!(policy.reschedule_on(JobState::Complete.into(), Some(&current), nine), None);
        assert_eq!(
            policy.reschedule_on(JobState::Incomplete.into(), Some(&current), nine),
            Some(ten)
        );
        assert_eq!(
            policy.reschedule_on(JobState::Exception.into(), Some(&current), nine),
            Some(ten)
        );
    }
}
