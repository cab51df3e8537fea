//! Intervals of time and schedule results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};

/// The latest instant chrono can represent, used as an open end.
pub const END_OF_TIME: DateTime<Utc> = DateTime::<Utc>::MAX_UTC;

/// A half open interval `[from, to)`. A point interval has `from == to`
/// and contains only that instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl Interval {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        if to < from {
            return Err(ScheduleError::InvalidInterval(format!(
                "{} is before {}",
                to, from
            )));
        }
        Ok(Self { from, to })
    }

    pub fn at(point: DateTime<Utc>) -> Self {
        Self {
            from: point,
            to: point,
        }
    }

    pub fn starting(from: DateTime<Utc>) -> Self {
        Self {
            from,
            to: END_OF_TIME,
        }
    }

    pub fn from_date(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to_date(&self) -> DateTime<Utc> {
        self.to
    }

    pub fn is_point(&self) -> bool {
        self.from == self.to
    }

    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        if self.is_point() {
            date == self.from
        } else {
            self.from <= date && date < self.to
        }
    }

    /// The overlap of two intervals, if any.
    pub fn limit(&self, other: &Interval) -> Option<Interval> {
        let from = self.from.max(other.from);
        let to = self.to.min(other.to);
        if from < to || (from == to && self.contains(from) && other.contains(from)) {
            Some(Interval { from, to })
        } else {
            None
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_point() {
            write!(f, "at {}", self.from.to_rfc3339())
        } else if self.to == END_OF_TIME {
            write!(f, "from {} onwards", self.from.to_rfc3339())
        } else {
            write!(f, "{} up to {}", self.from.to_rfc3339(), self.to.to_rfc3339())
        }
    }
}

/// One due occurrence of a schedule.
///
/// `use_next` is where evaluation should resume for the following
/// occurrence; `None` means this is the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub interval: Interval,
    pub use_next: Option<DateTime<Utc>>,
}

impl ScheduleResult {
    pub fn new(interval: Interval, use_next: Option<DateTime<Utc>>) -> Self {
        Self { interval, use_next }
    }

    /// A result whose next evaluation starts where this interval ends.
    pub fn continuing(interval: Interval) -> Self {
        let use_next = (interval.to_date() != END_OF_TIME).then_some(interval.to_date());
        Self { interval, use_next }
    }

    pub fn from_date(&self) -> DateTime<Utc> {
        self.interval.from_date()
    }

    pub fn to_date(&self) -> DateTime<Utc> {
        self.interval.to_date()
    }
}

impl fmt::Display for ScheduleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.use_next {
            Some(next) => write!(f, "{}, next from {}", self.interval, next.to_rfc3339()),
            None => write!(f, "{}, last", self.interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_half_open() {
        let interval = Interval::new(t(1), t(2)).unwrap();
        assert!(interval.contains(t(1)));
        assert!(interval.contains(t(1) + Duration::minutes(59)));
        assert!(!interval.contains(t(2)));
    }

    #[test]
    fn test_reversed_is_error() {
        assert!(Interval::new(t(2), t(1)).is_err());
    }

    #[test]
    fn test_limit() {
        let a = Interval::new(t(1), t(3)).unwrap();
        let b = Interval::new(t(2), t(4)).unwrap();
        assert_eq!(a.limit(&b), Some(Interval::new(t(2), t(3)).unwrap()));

        let c = Interval::new(t(3), t(4)).unwrap();
        assert_eq!(a.limit(&c), None);

        assert_eq!(Interval::at(t(2)).limit(&a), Some(Interval::at(t(2))));
    }

    #[test]
    fn test_continuing() {
        let result = ScheduleResult::continuing(Interval::new(t(1), t(2)).unwrap());
        assert_eq!(result.use_next, Some(t(2)));

        let open = ScheduleResult::continuing(Interval::starting(t(1)));
        assert_eq!(open.use_next, None);
    }

    #[test]
    fn test_display() {
        assert!(Interval::starting(t(1)).to_string().ends_with("onwards"));
        assert!(Interval::at(t(1)).to_string().starts_with("at "));
    }
}
