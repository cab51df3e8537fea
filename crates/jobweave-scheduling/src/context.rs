//! Data handed to a schedule on each evaluation.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, ScheduleError};
use crate::interval::Interval;

/// Key/value store owned by a driver and passed by reference into every
/// schedule evaluation. Schedules keep their own bookkeeping here, such as
/// how many times they have fired. The driver clears it on reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextData {
    values: HashMap<String, Value>,
}

impl ContextData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.values
            .get(key)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|source| ScheduleError::Context {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|source| ScheduleError::Context {
            key: key.clone(),
            source,
        })?;
        self.values.insert(key, value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Arguments of one schedule evaluation.
#[derive(Debug)]
pub struct ScheduleContext<'a> {
    /// Find the first occurrence at or after this instant.
    pub date: DateTime<Utc>,
    pub time_zone: FixedOffset,
    pub data: &'a mut ContextData,
    /// Occurrences must fall within this interval when set.
    pub parent_interval: Option<Interval>,
}

impl<'a> ScheduleContext<'a> {
    pub fn new(date: DateTime<Utc>, data: &'a mut ContextData) -> Self {
        Self {
            date,
            time_zone: utc_offset(),
            data,
            parent_interval: None,
        }
    }

    pub fn with_time_zone(mut self, time_zone: FixedOffset) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn with_parent_interval(mut self, interval: Option<Interval>) -> Self {
        self.parent_interval = interval;
        self
    }

    /// Evaluate from another date with the same zone, data and limits.
    pub fn move_to(&mut self, date: DateTime<Utc>) -> ScheduleContext<'_> {
        ScheduleContext {
            date,
            time_zone: self.time_zone,
            data: &mut *self.data,
            parent_interval: self.parent_interval,
        }
    }
}

pub(crate) fn utc_offset() -> FixedOffset {
    Utc.fix()
}

/// Parse a fixed offset such as `+01:00`, `-0530` or `Z`/`UTC`.
pub fn parse_time_zone(text: &str) -> Result<FixedOffset> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed == "Z" {
        return Ok(utc_offset());
    }
    let invalid = || ScheduleError::InvalidTimeZone(text.to_string());
    let (sign, rest) = match trimmed.split_at_checked(1) {
        Some(("+", rest)) => (1, rest),
        Some(("-", rest)) => (-1, rest),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
