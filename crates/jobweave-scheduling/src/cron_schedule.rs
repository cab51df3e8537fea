//! CronSchedule - cron expression based schedule.
//!
//! Occurrences are computed in the evaluation's time zone, so an expression
//! such as `0 0 9 * * MON-FRI` means 9 AM at the configured offset.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Timelike, Utc};

use crate::context::ScheduleContext;
use crate::error::{Result, ScheduleError};
use crate::interval::{Interval, ScheduleResult};
use crate::schedule::{checked_add, effective_start, Schedule};

/// Schedule driven by a cron expression.
///
/// The expression follows the `cron` crate's format:
/// `second minute hour day_of_month month day_of_week [year]`.
///
/// Examples:
/// - `"0 0 * * * *"` - Every hour at minute 0
/// - `"0 */5 * * * *"` - Every 5 minutes
/// - `"0 30 4 1 * *"` - 4:30 AM on the 1st of each month
///
/// Each occurrence is reported as a one second interval.
#[derive(Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: cron::Schedule,
}

impl CronSchedule {
    pub fn new(expression: &str) -> Result<Self> {
        let schedule = cron::Schedule::from_str(expression).map_err(|e| ScheduleError::InvalidCron {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CronSchedule")
            .field("expression", &self.expression)
            .finish()
    }
}

/// Round up to a whole second.
fn ceil_second(date: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if date.nanosecond() == 0 {
        return Ok(date);
    }
    let floor = date.with_nanosecond(0).ok_or(ScheduleError::DateOutOfRange)?;
    checked_add(floor, Duration::seconds(1))
}

impl Schedule for CronSchedule {
    fn next_due(&self, context: &mut ScheduleContext<'_>) -> Result<Option<ScheduleResult>> {
        let Some(start) = effective_start(context) else {
            return Ok(None);
        };
        // Occurrences are searched strictly after the given instant.
        let after = ceil_second(start)? - Duration::seconds(1);
        let Some(occurrence) = self
            .schedule
            .after(&after.with_timezone(&context.time_zone))
            .next()
        else {
            return Ok(None);
        };
        let from = occurrence.with_timezone(&Utc);
        if let Some(limits) = context.parent_interval {
            if !limits.contains(from) {
                return Ok(None);
            }
        }
        let to = checked_add(from, Duration::seconds(1))?;
        Ok(Some(ScheduleResult::continuing(Interval::new(from, to)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{parse_time_zone, ContextData};
    use chrono::TimeZone;

    #[test]
    fn test_invalid_expression() {
        let err = CronSchedule::new("not cron").unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidCron { .. }));
    }

    #[test]
    fn test_every_five_minutes() {
        let schedule = CronSchedule::new("0 */5 * * * *").unwrap();
        let mut data = ContextData::new();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 2, 30).unwrap();

        let result = schedule
            .next_due(&mut ScheduleContext::new(start, &mut data))
            .unwrap()
            .unwrap();

        assert_eq!(result.from_date(), Utc.with_ymd_and_hms(2024, 6, 1, 9, 5, 0).unwrap());
        assert_eq!(result.use_next, Some(Utc.with_ymd_and_hms(2024, 6, 1, 9, 5, 1).unwrap()));
    }

    #[test]
    fn test_occurrence_at_start_is_included() {
        let schedule = CronSchedule::new("0 0 * * * *").unwrap();
        let mut data = ContextData::new();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();

        let result = schedule
            .next_due(&mut ScheduleContext::new(start, &mut data))
            .unwrap()
            .unwrap();

        assert_eq!(result.from_date(), start);
    }

    #[test]
    fn test_time_zone_applies() {
        let schedule = CronSchedule::new("0 0 9 * * *").unwrap();
        let mut data = ContextData::new();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let zone = parse_time_zone("+02:00").unwrap();

        let result = schedule
            .next_due(&mut ScheduleContext::new(start, &mut data).with_time_zone(zone))
            .unwrap()
            .unwrap();

        assert_eq!(result.from_date(), Utc.with_ymd_and_hms(2024, 6, 1, 7, 0, 0).unwrap());
    }

    #[test]
    fn test_outside_limits() {
        let schedule = CronSchedule::new("0 0 12 * * *").unwrap();
        let mut data = ContextData::new();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let limits = Interval::new(start, start + Duration::hours(1)).unwrap();

        let result = schedule
            .next_due(&mut ScheduleContext::new(start, &mut data).with_parent_interval(Some(limits)))
            .unwrap();

        assert!(result.is_none());
    }
}
