//! Job execution errors.

use thiserror::Error;

use super::lock::StateLockError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job failed: {0}")]
    Failed(String),

    #[error("Failed to stop [{name}]: {reason}")]
    FailedToStop { name: String, reason: String },

    #[error("Job [{0}] is not stateful")]
    NotStateful(String),

    #[error("Invalid state for {operation}: {state}")]
    InvalidState { operation: String, state: String },

    #[error("State lock error: {0}")]
    Lock(#[from] StateLockError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl JobError {
    /// Create a failure from any message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors raised by a state operator while reducing child states.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateOperatorError {
    #[error("Child at index {index} is destroyed and can not be aggregated")]
    DestroyedChild { index: usize },

    #[error("Child at index {index} has not published a state")]
    MissingState { index: usize },
}
