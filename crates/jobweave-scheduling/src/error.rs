//! Error types for scheduling.

use thiserror::Error;

use jobweave_protocols::{JobError, StateLockError};

/// Errors raised while configuring or driving a schedule.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// No schedule set before starting.
    #[error("No schedule")]
    NoSchedule,

    /// No executor set before starting.
    #[error("No executor to schedule with")]
    NoExecutor,

    /// The driven job does not publish state.
    #[error("Child job [{0}] must be stateful")]
    NotStateful(String),

    /// Cron expression failed to parse.
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    /// Time zone is not a fixed offset such as "+01:00".
    #[error("Invalid time zone '{0}'")]
    InvalidTimeZone(String),

    /// Interval with its end before its start, or a zero period.
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// A date outside the range chrono can represent.
    #[error("Date out of range")]
    DateOutOfRange,

    /// Stored context value of the wrong shape.
    #[error("Bad context value for '{key}': {source}")]
    Context {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Lock(#[from] StateLockError),

    #[error(transparent)]
    Job(#[from] JobError),
}

/// Result type for scheduling operations.
pub type Result<T> = std::result::Result<T, ScheduleError>;

impl From<ScheduleError> for JobError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::Job(e) => e,
            ScheduleError::Lock(e) => JobError::Lock(e),
            other => JobError::failed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ScheduleError::NoSchedule.to_string(), "No schedule");
        let err = ScheduleError::InvalidCron {
            expression: "bad".to_string(),
            reason: "too short".to_string(),
        };
        assert!(err.to_string().contains("'bad'"));
    }

    #[test]
    fn test_into_job_error() {
        let job: JobError = ScheduleError::NoExecutor.into();
        assert!(matches!(job, JobError::Failed(_)));

        let job: JobError = ScheduleError::Lock(StateLockError::Interrupted).into();
        assert!(matches!(job, JobError::Lock(StateLockError::Interrupted)));
    }
}
