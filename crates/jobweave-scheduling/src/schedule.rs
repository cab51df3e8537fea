//! The schedule abstraction and the basic schedules.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::context::ScheduleContext;
use crate::error::{Result, ScheduleError};
use crate::interval::{Interval, ScheduleResult};

/// Computes the next due occurrence at or after `context.date`.
///
/// `Ok(None)` means there are no further occurrences. Occurrences must lie
/// within `context.parent_interval` when one is given.
pub trait Schedule: Send + Sync + fmt::Debug {
    fn next_due(&self, context: &mut ScheduleContext<'_>) -> Result<Option<ScheduleResult>>;
}

impl<S: Schedule + ?Sized> Schedule for Arc<S> {
    fn next_due(&self, context: &mut ScheduleContext<'_>) -> Result<Option<ScheduleResult>> {
        (**self).next_due(context)
    }
}

impl<S: Schedule + ?Sized> Schedule for Box<S> {
    fn next_due(&self, context: &mut ScheduleContext<'_>) -> Result<Option<ScheduleResult>> {
        (**self).next_due(context)
    }
}

/// The evaluation date moved forward to the start of the parent interval,
/// or `None` if it is already past the parent's end.
pub(crate) fn effective_start(context: &ScheduleContext<'_>) -> Option<DateTime<Utc>> {
    match context.parent_interval {
        None => Some(context.date),
        Some(limits) => {
            let start = context.date.max(limits.from_date());
            limits.contains(start).then_some(start)
        }
    }
}

pub(crate) fn checked_add(date: DateTime<Utc>, by: Duration) -> Result<DateTime<Utc>> {
    date.checked_add_signed(by).ok_or(ScheduleError::DateOutOfRange)
}

/// Due immediately, and again immediately after. Usually wrapped in a
/// [`CountSchedule`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NowSchedule;

impl Schedule for NowSchedule {
    fn next_due(&self, context: &mut ScheduleContext<'_>) -> Result<Option<ScheduleResult>> {
        Ok(effective_start(context).map(|now| ScheduleResult::new(Interval::at(now), Some(now))))
    }
}

/// Due every `period`, starting from the evaluation date.
#[derive(Debug, Clone, Copy)]
pub struct IntervalSchedule {
    period: Duration,
}

impl IntervalSchedule {
    pub fn new(period: Duration) -> Result<Self> {
        if period <= Duration::zero() {
            return Err(ScheduleError::InvalidInterval(format!(
                "period must be positive, was {}",
                period
            )));
        }
        Ok(Self { period })
    }

    pub fn every_millis(millis: i64) -> Result<Self> {
        Self::new(Duration::milliseconds(millis))
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Schedule for IntervalSchedule {
    fn next_due(&self, context: &mut ScheduleContext<'_>) -> Result<Option<ScheduleResult>> {
        let Some(start) = effective_start(context) else {
            return Ok(None);
        };
        let end = checked_add(start, self.period)?;
        Ok(Some(ScheduleResult::continuing(Interval::new(start, end)?)))
    }
}

/// Due once, at a fixed instant. Nothing is due once it has passed.
#[derive(Debug, Clone, Copy)]
pub struct DateSchedule {
    at: DateTime<Utc>,
}

impl DateSchedule {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }
}

impl Schedule for DateSchedule {
    fn next_due(&self, context: &mut ScheduleContext<'_>) -> Result<Option<ScheduleResult>> {
        if context.date > self.at {
            return Ok(None);
        }
        if let Some(limits) = context.parent_interval {
            if !limits.contains(self.at) {
                return Ok(None);
            }
        }
        Ok(Some(ScheduleResult::new(Interval::at(self.at), None)))
    }
}

/// Limits another schedule to a number of occurrences.
///
/// The count is kept in the context data under `key`, so it survives
/// between evaluations and restarts from zero when the driver resets.
#[derive(Debug, Clone)]
pub struct CountSchedule {
    count: u32,
    key: String,
    refinement: Arc<dyn Schedule>,
}

impl CountSchedule {
    pub fn new(count: u32, refinement: Arc<dyn Schedule>) -> Self {
        Self {
            count,
            key: "count".to_string(),
            refinement,
        }
    }

    /// Use a different context key, for nested counts.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Schedule for CountSchedule {
    fn next_due(&self, context: &mut ScheduleContext<'_>) -> Result<Option<ScheduleResult>> {
        let used: u32 = context.data.get(&self.key)?.unwrap_or(0);
        if used >= self.count {
            return Ok(None);
        }
        let result = self.refinement.next_due(context)?;
        if result.is_some() {
            context.data.set(self.key.clone(), used + 1)?;
        }
        Ok(result)
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
