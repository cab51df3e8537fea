//! Schedules and the drivers that run jobs on them.
//!
//! A [`Schedule`] answers "when is this next due?" for a given instant.
//! A [`ScheduleDriver`] repeatedly asks that question, arms the answer on a
//! [`ScheduledExecutor`] and runs its child job when it comes due. [`Timer`]
//! and [`Retry`] are the two driver policies.

pub mod clock;
pub mod config;
pub mod context;
pub mod cron_schedule;
pub mod driver;
pub mod error;
pub mod executor;
pub mod interval;
mod latch;
pub mod retry;
pub mod schedule;
pub mod timer;

pub use clock::{Clock, DefaultClock, ManualClock};
pub use config::{Keyword, RetrySpec, ScheduleSpec, TimerSpec};
pub use context::{parse_time_zone, ContextData, ScheduleContext};
pub use cron_schedule::CronSchedule;
pub use driver::{SchedulePolicy, ScheduleDriver};
pub use error::{Result, ScheduleError};
pub use executor::{Action, ManualExecutor, ScheduledExecutor, ScheduledHandle, TokioScheduledExecutor};
pub use interval::{Interval, ScheduleResult, END_OF_TIME};
pub use retry::{Retry, RetryPolicy};
pub use schedule::{CountSchedule, DateSchedule, IntervalSchedule, NowSchedule, Schedule};
pub use timer::{Timer, TimerPolicy};
