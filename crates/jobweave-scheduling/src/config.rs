//! Declarative descriptions of schedules and timers.
//!
//! These are plain serde types so the configuration crate can embed them
//! in its TOML schema. Each has a `build` that turns it into live objects.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use jobweave_protocols::Job;

use crate::context::parse_time_zone;
use crate::cron_schedule::CronSchedule;
use crate::error::{Result, ScheduleError};
use crate::executor::ScheduledExecutor;
use crate::retry::Retry;
use crate::schedule::{CountSchedule, IntervalSchedule, NowSchedule, Schedule};
use crate::timer::{Timer, TimerPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Keyword {
    Now,
}

/// One of:
///
/// ```toml
/// schedule = "now"
/// schedule = { every_ms = 60000 }
/// schedule = { count = 3, every_ms = 1000 }
/// schedule = { cron = "0 */5 * * * *" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleSpec {
    Cron { cron: String },
    Count { count: u32, every_ms: u64 },
    Every { every_ms: u64 },
    Now(Keyword),
}

impl ScheduleSpec {
    pub fn build(&self) -> Result<Arc<dyn Schedule>> {
        Ok(match self {
            // Once, straight away.
            Self::Now(Keyword::Now) => Arc::new(CountSchedule::new(1, Arc::new(NowSchedule))),
            Self::Every { every_ms } => Arc::new(every(*every_ms)?),
            Self::Count { count, every_ms } => {
                if *count == 0 {
                    return Err(ScheduleError::InvalidInterval("count must be at least 1".into()));
                }
                Arc::new(CountSchedule::new(*count, Arc::new(every(*every_ms)?)))
            }
            Self::Cron { cron } => Arc::new(CronSchedule::new(cron)?),
        })
    }
}

fn every(millis: u64) -> Result<IntervalSchedule> {
    let millis = i64::try_from(millis)
        .map_err(|_| ScheduleError::InvalidInterval(format!("{millis}ms is too long")))?;
    IntervalSchedule::every_millis(millis)
}

/// Retry the timer's job a number of times before giving up on this
/// occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySpec {
    pub every_ms: u64,
    pub attempts: u32,
}

impl RetrySpec {
    pub fn schedule(&self) -> ScheduleSpec {
        ScheduleSpec::Count {
            count: self.attempts,
            every_ms: self.every_ms,
        }
    }
}

fn default_message() -> String {
    "Tick".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSpec {
    pub name: String,
    pub schedule: ScheduleSpec,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub skip_missed_runs: bool,
    #[serde(default)]
    pub halt_on_failure: bool,
    #[serde(default)]
    pub retry: Option<RetrySpec>,
    /// Logged by the job each time the timer fires.
    #[serde(default = "default_message")]
    pub message: String,
}

impl TimerSpec {
    /// Check everything `build` would check, without building.
    pub fn validate(&self) -> Result<()> {
        self.schedule.build()?;
        if let Some(retry) = &self.retry {
            retry.schedule().build()?;
        }
        if let Some(tz) = &self.time_zone {
            parse_time_zone(tz)?;
        }
        Ok(())
    }

    /// Build a timer driving `job`, wrapped in a retry when configured.
    pub fn build(&self, job: Arc<dyn Job>, executor: Arc<dyn ScheduledExecutor>) -> Result<Timer> {
        let policy = TimerPolicy::default()
            .skip_missed_runs(self.skip_missed_runs)
            .halt_on_failure(self.halt_on_failure);
        let timer = Timer::new(self.name.clone(), policy);
        timer.set_schedule(self.schedule.build()?);
        timer.set_executor(executor.clone());
        if let Some(tz) = &self.time_zone {
            timer.set_time_zone_id(tz)?;
        }
        let child = match &self.retry {
            None => job,
            Some(spec) => {
                let retry = Retry::retry(format!("{} retry", self.name));
                retry.set_schedule(spec.schedule().build()?);
                retry.set_executor(executor);
                retry.set_time_zone(timer.time_zone());
                retry.set_job(Some(job))?;
                let retry = Arc::new(retry);
                // Retries stay inside the occurrence that started them.
                timer.pass_limits_to(&retry);
                retry as Arc<dyn Job>
            }
        };
        timer.set_job(Some(child))?;
        Ok(timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ManualExecutor;
    use jobweave_core::FnJob;

    #[derive(Debug, Deserialize)]
    struct Doc {
        timers: Vec<TimerSpec>,
    }

    #[test]
    fn test_parse_schedules() {
        let doc: Doc = toml::from_str(
            r#"
            [[timers]]
            name = "once"
            schedule = "now"

            [[timers]]
            name = "every"
            schedule = { every_ms = 1000 }

            [[timers]]
            name = "three"
            schedule = { count = 3, every_ms = 500 }

            [[timers]]
            name = "cron"
            schedule = { cron = "0 */5 * * * *" }
            time_zone = "+01:00"
            retry = { every_ms = 100, attempts = 2 }
            "#,
        )
        .unwrap();

        let schedules: Vec<_> = doc.timers.iter().map(|t| t.schedule.clone()).collect();
        assert_eq!(
            schedules,
            vec![
                ScheduleSpec::Now(Keyword::Now),
                ScheduleSpec::Every { every_ms: 1000 },
                ScheduleSpec::Count { count: 3, every_ms: 500 },
                ScheduleSpec::Cron { cron: "0 */5 * * * *".into() },
            ]
        );
        assert_eq!(doc.timers[0].message, "Tick");
        assert_eq!(doc.timers[3].retry, Some(RetrySpec { every_ms: 100, attempts: 2 }));
        for timer in &doc.timers {
            timer.validate().unwrap();
        }
    }

    #[test]
    fn test_invalid_specs() {
        assert!(ScheduleSpec::Every { every_ms: 0 }.build().is_err());
        assert!(ScheduleSpec::Count { count: 0, every_ms: 10 }.build().is_err());
        assert!(matches!(
            ScheduleSpec::Cron { cron: "nonsense".into() }.build(),
            Err(ScheduleError::InvalidCron { .. })
        ));

        let spec = TimerSpec {
            name: "t".into(),
            schedule: ScheduleSpec::Now(Keyword::Now),
            time_zone: Some("Mars/Olympus".into()),
            skip_missed_runs: false,
            halt_on_failure: false,
            retry: None,
            message: default_message(),
        };
        assert!(matches!(spec.validate(), Err(ScheduleError::InvalidTimeZone(_))));
    }

    #[test]
    fn test_build_wraps_retry() {
        let spec = TimerSpec {
            name: "nightly".into(),
            schedule: ScheduleSpec::Every { every_ms: 60_000 },
            time_zone: None,
            skip_missed_runs: true,
            halt_on_failure: false,
            retry: Some(RetrySpec { every_ms: 10, attempts: 3 }),
            message: default_message(),
        };
        let timer = spec
            .build(Arc::new(FnJob::completing("job")), Arc::new(ManualExecutor::new()))
            .unwrap();

        assert!(timer.policy().skip_missed_runs);
        let child = timer.job().unwrap();
        assert_eq!(child.name(), "nightly retry");
        assert!(child.as_structural().is_some());
    }
}
